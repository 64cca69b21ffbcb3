use super::effects::{EffectDispatcher, SideEffects};
use super::trust::{REASON_LOAN_DEFAULTED, REASON_LOAN_LENT_DEFAULTED, TrustScoreTracker};
use crate::domain::audit::AuditEvent;
use crate::domain::ids::LoanId;
use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::notification::{Notice, NotificationKind};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{Result, SettlementError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::{info, warn};

const BORROWER_PENALTY: Decimal = dec!(-50);
const LENDER_PENALTY: Decimal = dec!(-5);

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepReport {
    pub defaulted: Vec<LoanId>,
    /// Loans that could not be defaulted this run; they stay active.
    pub failed: Vec<(LoanId, String)>,
}

/// Defaults overdue loans. Driven by an external scheduler.
///
/// Each loan is handled in its own unit of work over its two holders, and the
/// loan is re-read under lock, so a concurrent or repeated sweep never
/// penalizes the same loan twice.
pub struct LoanSweeper {
    store: LedgerStoreRef,
    trust: TrustScoreTracker,
    effects: EffectDispatcher,
}

impl LoanSweeper {
    pub fn new(store: LedgerStoreRef, effects: EffectDispatcher) -> Self {
        Self {
            trust: TrustScoreTracker::new(store.clone()),
            store,
            effects,
        }
    }

    pub async fn sweep_overdue(&self, today: NaiveDate) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for loan in self.store.loans_overdue(today).await? {
            match self.default_loan(&loan, today).await {
                Ok(Some(effects)) => {
                    report.defaulted.push(loan.id);
                    self.effects.dispatch(effects).await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(loan = %loan.id, error = %e, "could not default overdue loan");
                    report.failed.push((loan.id, e.to_string()));
                }
            }
        }
        info!(
            %today,
            defaulted = report.defaulted.len(),
            failed = report.failed.len(),
            "overdue loan sweep finished"
        );
        Ok(report)
    }

    /// Returns `None` when the loan was no longer overdue once locked.
    async fn default_loan(&self, loan: &Loan, today: NaiveDate) -> Result<Option<SideEffects>> {
        let mut unit = self.store.begin(&[loan.borrower, loan.lender]).await?;
        let Some(mut current) = unit.loan(loan.id).await?.filter(|l| l.is_overdue(today)) else {
            return Ok(None);
        };
        let (Some(lender), Some(borrower)) = (
            unit.holder(current.lender).await?,
            unit.holder(current.borrower).await?,
        ) else {
            return Err(SettlementError::not_found(format!(
                "Holders of loan {} not found.",
                current.id
            )));
        };

        current.transition(LoanStatus::Defaulted)?;
        unit.put_loan(current.clone()).await?;
        self.trust
            .adjust(unit.as_mut(), borrower.id, REASON_LOAN_DEFAULTED, BORROWER_PENALTY)
            .await?;
        self.trust
            .adjust(unit.as_mut(), lender.id, REASON_LOAN_LENT_DEFAULTED, LENDER_PENALTY)
            .await?;
        unit.commit().await?;

        let mut effects = SideEffects::new();
        effects
            .notify(
                Notice::new(
                    lender.id,
                    format!(
                        "Your loan of {} to {} is overdue and has been marked as defaulted.",
                        current.amount, borrower.first_name
                    ),
                    NotificationKind::LoanDefaulted,
                )
                .with_sms(),
            )
            .notify(
                Notice::new(
                    borrower.id,
                    format!(
                        "Your loan of {} from {} is overdue and has been marked as defaulted.",
                        current.amount, lender.first_name
                    ),
                    NotificationKind::LoanDefaulted,
                )
                .with_sms(),
            )
            .audit(AuditEvent::new(
                "loan_defaulted",
                Some(borrower.id),
                json!({
                    "loan": current.id.to_string(),
                    "lender": lender.id.to_string(),
                    "repayment_date": current.repayment_date.to_string(),
                }),
            ));
        Ok(Some(effects))
    }
}
