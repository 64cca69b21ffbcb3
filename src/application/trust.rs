use crate::domain::ids::HolderId;
use crate::domain::ledger::EntryStatus;
use crate::domain::ports::{LedgerStoreRef, UnitOfWork};
use crate::domain::trust::TrustScore;
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

pub const REASON_TRANSFER_SENT: &str = "successful_transfer_sent";
pub const REASON_TRANSFER_RECEIVED: &str = "successful_transfer_received";
pub const REASON_FRAUD_BLOCKED: &str = "fraud_attempt_blocked";
pub const REASON_LOAN_DEFAULTED: &str = "loan_defaulted";
pub const REASON_LOAN_LENT_DEFAULTED: &str = "loan_lent_defaulted";
pub const REASON_LOAN_REPAID: &str = "loan_repaid";
pub const REASON_RECALCULATION: &str = "periodic_recalculation";

const BASELINE: Decimal = dec!(50);
const POINTS_PER_TRANSFER: Decimal = dec!(1.5);
const SAVINGS_DIVISOR: Decimal = dec!(10);

/// Maintains the bounded trust score and its append-only history.
///
/// Every mutation writes exactly one history record through the unit of work
/// it runs in, so a score change commits or rolls back with the settlement
/// that caused it.
#[derive(Clone)]
pub struct TrustScoreTracker {
    store: LedgerStoreRef,
}

impl TrustScoreTracker {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Applies `delta` inside an open unit of work and returns the new score.
    pub async fn adjust(
        &self,
        unit: &mut dyn UnitOfWork,
        holder: HolderId,
        reason: &str,
        delta: Decimal,
    ) -> Result<TrustScore> {
        let current = unit
            .holder(holder)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("Holder {holder} not found.")))?;
        let score = current.trust_score.adjusted(delta);
        unit.record_trust_score(holder, score, reason).await?;
        debug!(%holder, reason, %delta, %score, "trust score adjusted");
        Ok(score)
    }

    /// Recomputes the score from history in its own unit of work.
    ///
    /// `50 + 1.5 x completed outbound transfers + total saved / 10`, clamped.
    pub async fn recalculate(&self, holder: HolderId) -> Result<TrustScore> {
        let mut unit = self.store.begin(&[holder]).await?;
        if unit.holder(holder).await?.is_none() {
            return Err(SettlementError::not_found(format!("Holder {holder} not found.")));
        }

        let transfers = unit
            .entries_sent_by(holder)
            .await?
            .iter()
            .filter(|e| e.is_outbound_from(holder) && e.status == EntryStatus::Completed)
            .count();
        // saturates; the score is clamped far below Decimal::MAX
        let saved = unit
            .goals_of(holder)
            .await?
            .iter()
            .fold(Decimal::ZERO, |acc, g| {
                acc.saturating_add(g.current_amount.value() / SAVINGS_DIVISOR)
            });

        let raw = (BASELINE + POINTS_PER_TRANSFER * Decimal::from(transfers)).saturating_add(saved);
        let score = TrustScore::clamped(raw);

        unit.record_trust_score(holder, score, REASON_RECALCULATION)
            .await?;
        unit.commit().await?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Account, SavingsGoal};
    use crate::domain::holder::Holder;
    use crate::domain::ledger::{EntryType, LedgerEntry};
    use crate::domain::money::Amount;
    use crate::domain::ports::LedgerStore;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use rand::Rng;
    use std::sync::Arc;

    async fn setup() -> (Arc<InMemoryLedger>, TrustScoreTracker, HolderId, HolderId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let a = Holder::new("100", "Ada");
        let b = Holder::new("200", "Bo");
        let mut unit = ledger.begin(&[a.id, b.id]).await.unwrap();
        for h in [&a, &b] {
            unit.insert_holder(h.clone()).await.unwrap();
            unit.open_account(Account::open(h.id, "USD")).await.unwrap();
        }
        unit.commit().await.unwrap();
        let tracker = TrustScoreTracker::new(ledger.clone());
        (ledger, tracker, a.id, b.id)
    }

    #[tokio::test]
    async fn test_adjust_clamps_and_records_history() {
        let (ledger, tracker, a, _) = setup().await;

        let mut unit = ledger.begin(&[a]).await.unwrap();
        let score = tracker
            .adjust(unit.as_mut(), a, REASON_FRAUD_BLOCKED, dec!(-75))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert_eq!(score.value(), dec!(0));
        let history = ledger.trust_history(a).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score.value(), dec!(0));
        assert_eq!(history[0].reason, REASON_FRAUD_BLOCKED);
    }

    #[tokio::test]
    async fn test_random_delta_sequences_stay_in_bounds() {
        let (ledger, tracker, a, _) = setup().await;
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let delta = Decimal::from(rng.gen_range(-400i64..=400)) / dec!(2);
            let mut unit = ledger.begin(&[a]).await.unwrap();
            let score = tracker.adjust(unit.as_mut(), a, "fuzz", delta).await.unwrap();
            unit.commit().await.unwrap();
            assert!(score.value() >= TrustScore::MIN && score.value() <= TrustScore::MAX);
        }
        assert_eq!(ledger.trust_history(a).await.unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_rolled_back_adjustment_leaves_no_history() {
        let (ledger, tracker, a, _) = setup().await;
        {
            let mut unit = ledger.begin(&[a]).await.unwrap();
            tracker.adjust(unit.as_mut(), a, "dropped", dec!(10)).await.unwrap();
        }
        assert!(ledger.trust_history(a).await.unwrap().is_empty());
        let holder = ledger.holder(a).await.unwrap().unwrap();
        assert_eq!(holder.trust_score, TrustScore::INITIAL);
    }

    #[tokio::test]
    async fn test_recalculate_from_history() {
        let (ledger, tracker, a, b) = setup().await;
        let ten = Amount::new(dec!(10)).unwrap();

        let mut unit = ledger.begin(&[a, b]).await.unwrap();
        for _ in 0..4 {
            unit.append_entry(LedgerEntry::completed(EntryType::Transfer, a, b, ten, "USD"))
                .await
                .unwrap();
        }
        // self-to-self entries are not outbound transfers
        unit.append_entry(LedgerEntry::internal(EntryType::Deposit, a, ten, "USD"))
            .await
            .unwrap();
        let mut goal = SavingsGoal::new(a, "Car", Amount::new(dec!(1000)).unwrap(), None);
        goal.contribute(Amount::new(dec!(35)).unwrap()).unwrap();
        unit.put_goal(goal).await.unwrap();
        unit.commit().await.unwrap();

        let score = tracker.recalculate(a).await.unwrap();
        // 50 + 4 * 1.5 + 35 / 10
        assert_eq!(score.value(), dec!(59.5));

        let history = ledger.trust_history(a).await.unwrap();
        assert_eq!(history.last().unwrap().reason, REASON_RECALCULATION);
        assert_eq!(ledger.holder(a).await.unwrap().unwrap().trust_score.value(), dec!(59.5));
    }

    #[tokio::test]
    async fn test_recalculate_unknown_holder() {
        let (_, tracker, _, _) = setup().await;
        let result = tracker.recalculate(HolderId::generate()).await;
        assert!(matches!(result, Err(SettlementError::NotFound(_))));
    }
}
