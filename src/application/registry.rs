//! Lifecycle of the records settlement depends on: holders, beneficiaries,
//! goals, insurance products, merchants and loans.
//!
//! Everything here goes through the same units of work as settlement, so the
//! uniqueness rules of the ledger apply.

use super::effects::{EffectDispatcher, SideEffects};
use super::trust::{REASON_LOAN_REPAID, TrustScoreTracker};
use crate::domain::account::{Account, SavingsGoal, currency_code};
use crate::domain::audit::AuditEvent;
use crate::domain::beneficiary::BeneficiaryLink;
use crate::domain::holder::Holder;
use crate::domain::ids::{HolderId, LoanId};
use crate::domain::insurance::InsuranceProduct;
use crate::domain::ledger::{EntryType, LedgerEntry};
use crate::domain::loan::{DEFAULT_INTEREST_RATE, Loan, LoanStatus};
use crate::domain::merchant::Merchant;
use crate::domain::money::Amount;
use crate::domain::notification::{Notice, NotificationKind};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{Result, SettlementError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::info;

const REPAYMENT_REWARD: Decimal = dec!(25);

pub struct Registry {
    store: LedgerStoreRef,
    trust: TrustScoreTracker,
    effects: EffectDispatcher,
}

impl Registry {
    pub fn new(store: LedgerStoreRef, effects: EffectDispatcher) -> Self {
        Self {
            trust: TrustScoreTracker::new(store.clone()),
            store,
            effects,
        }
    }

    /// Creates a holder together with its single wallet.
    pub async fn register_holder(
        &self,
        phone: &str,
        first_name: &str,
        currency: &str,
    ) -> Result<Holder> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(SettlementError::invalid("Phone number is required."));
        }
        let currency = currency_code(currency)?;
        let holder = Holder::new(phone, first_name.trim());

        let mut unit = self.store.begin(&[holder.id]).await?;
        unit.insert_holder(holder.clone()).await?;
        unit.open_account(Account::open(holder.id, currency.clone()))
            .await?;
        unit.commit().await?;

        info!(holder = %holder.id, %currency, "holder registered");
        self.audit(
            "holder_registered",
            Some(holder.id),
            json!({ "currency": currency }),
        )
        .await;
        Ok(holder)
    }

    pub async fn add_beneficiary(
        &self,
        owner: HolderId,
        counterparty_phone: &str,
        nickname: &str,
    ) -> Result<BeneficiaryLink> {
        let nickname = nickname.trim();
        if counterparty_phone.trim().is_empty() || nickname.is_empty() {
            return Err(SettlementError::invalid("Phone and nickname are required."));
        }
        let counterparty = self
            .store
            .holder_by_phone(counterparty_phone.trim())
            .await?
            .ok_or_else(|| SettlementError::not_found("User with this phone number not found."))?;
        if counterparty.id == owner {
            return Err(SettlementError::invalid(
                "You cannot add yourself as a beneficiary.",
            ));
        }

        let mut unit = self.store.begin(&[owner]).await?;
        if unit.holder(owner).await?.is_none() {
            return Err(SettlementError::not_found(format!("Holder {owner} not found.")));
        }
        let link = BeneficiaryLink::new(owner, counterparty.id, nickname);
        unit.insert_beneficiary(link.clone()).await?;
        unit.commit().await?;
        Ok(link)
    }

    pub async fn beneficiaries(&self, owner: HolderId) -> Result<Vec<BeneficiaryLink>> {
        self.store.beneficiaries(owner).await
    }

    pub async fn create_savings_goal(
        &self,
        holder: HolderId,
        title: &str,
        target_amount: Amount,
        deadline: Option<NaiveDate>,
    ) -> Result<SavingsGoal> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SettlementError::invalid(
                "Title and target_amount are required.",
            ));
        }

        let mut unit = self.store.begin(&[holder]).await?;
        if unit.holder(holder).await?.is_none() {
            return Err(SettlementError::not_found(format!("Holder {holder} not found.")));
        }
        let goal = SavingsGoal::new(holder, title, target_amount, deadline);
        unit.put_goal(goal.clone()).await?;
        unit.commit().await?;
        Ok(goal)
    }

    /// Adds an active product to the insurance catalogue.
    pub async fn add_insurance_product(
        &self,
        name: &str,
        description: &str,
        coverage_amount: Amount,
        premium_amount: Amount,
    ) -> Result<InsuranceProduct> {
        if name.trim().is_empty() {
            return Err(SettlementError::invalid("Product name is required."));
        }
        let product = InsuranceProduct::new(
            name.trim(),
            description.trim(),
            coverage_amount,
            premium_amount,
        );
        let mut unit = self.store.begin(&[]).await?;
        unit.put_insurance_product(product.clone()).await?;
        unit.commit().await?;
        Ok(product)
    }

    /// Gives a holder its merchant identity and API key.
    pub async fn register_merchant(&self, holder: HolderId, business_name: &str) -> Result<Merchant> {
        let business_name = business_name.trim();
        if business_name.is_empty() {
            return Err(SettlementError::invalid("Business name is required."));
        }

        let mut unit = self.store.begin(&[holder]).await?;
        if unit.holder(holder).await?.is_none() {
            return Err(SettlementError::not_found("User not found."));
        }
        // the commit-time claim still backs this up
        if self.store.merchant_of(holder).await?.is_some() {
            return Err(SettlementError::invalid(
                "User is already registered as a merchant.",
            ));
        }
        let merchant = Merchant::new(holder, business_name);
        unit.insert_merchant(merchant.clone()).await?;
        unit.commit().await?;

        info!(%holder, merchant = %merchant.id, "merchant registered");
        self.audit(
            "merchant_registered",
            Some(holder),
            json!({ "merchant": merchant.id.to_string() }),
        )
        .await;
        Ok(merchant)
    }

    /// Borrower asks a lender, identified by phone, for a loan.
    pub async fn request_loan(
        &self,
        borrower: HolderId,
        lender_phone: &str,
        amount: Amount,
        interest_rate: Option<Decimal>,
        repayment_date: NaiveDate,
    ) -> Result<Loan> {
        let interest_rate = interest_rate.unwrap_or(DEFAULT_INTEREST_RATE);
        if interest_rate < Decimal::ZERO {
            return Err(SettlementError::invalid("Interest rate cannot be negative."));
        }
        let lender = self
            .store
            .holder_by_phone(lender_phone)
            .await?
            .ok_or_else(|| SettlementError::not_found("Lender not found with that phone number."))?;
        if lender.id == borrower {
            return Err(SettlementError::invalid("You cannot borrow from yourself."));
        }

        let mut unit = self.store.begin(&[borrower, lender.id]).await?;
        let requester = unit
            .holder(borrower)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("Holder {borrower} not found.")))?;
        let loan = Loan::request(lender.id, borrower, amount, interest_rate, repayment_date);
        unit.put_loan(loan.clone()).await?;
        unit.commit().await?;

        let mut effects = SideEffects::new();
        effects.notify(Notice::new(
            lender.id,
            format!(
                "{} has requested a loan of {amount} from you.",
                requester.first_name
            ),
            NotificationKind::LoanRequest,
        ));
        self.effects.dispatch(effects).await;
        Ok(loan)
    }

    /// Lender accepts a requested loan and the principal is disbursed.
    pub async fn activate_loan(&self, lender: HolderId, loan_id: LoanId) -> Result<Loan> {
        let loan = self.loan_of(loan_id, |l| l.lender == lender).await?;

        let mut unit = self.store.begin(&[loan.lender, loan.borrower]).await?;
        let mut loan = unit
            .loan(loan_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Loan not found."))?;
        loan.transition(LoanStatus::Active)?;
        let account = unit.debit(loan.lender, loan.amount).await?;
        unit.credit(loan.borrower, loan.amount).await?;
        unit.append_entry(LedgerEntry::completed(
            EntryType::LoanDisbursement,
            loan.lender,
            loan.borrower,
            loan.amount,
            account.currency,
        ))
        .await?;
        unit.put_loan(loan.clone()).await?;
        unit.commit().await?;

        info!(loan = %loan.id, lender = %loan.lender, borrower = %loan.borrower, "loan activated");
        let mut effects = SideEffects::new();
        effects
            .notify(
                Notice::new(
                    loan.borrower,
                    format!("Your loan of {} has been approved and disbursed.", loan.amount),
                    NotificationKind::LoanActivated,
                )
                .with_sms(),
            )
            .audit(AuditEvent::new(
                "loan_activated",
                Some(loan.lender),
                json!({ "loan": loan.id.to_string() }),
            ));
        self.effects.dispatch(effects).await;
        Ok(loan)
    }

    /// Borrower repays principal plus interest; the loan becomes `paid`.
    pub async fn repay_loan(&self, borrower: HolderId, loan_id: LoanId) -> Result<Loan> {
        let loan = self.loan_of(loan_id, |l| l.borrower == borrower).await?;

        let mut unit = self.store.begin(&[loan.lender, loan.borrower]).await?;
        let mut loan = unit
            .loan(loan_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Loan not found."))?;
        let due = loan.amount_due()?;
        loan.transition(LoanStatus::Paid)?;
        let account = unit.debit(loan.borrower, due).await?;
        unit.credit(loan.lender, due).await?;
        unit.append_entry(LedgerEntry::completed(
            EntryType::LoanRepayment,
            loan.borrower,
            loan.lender,
            due,
            account.currency,
        ))
        .await?;
        unit.put_loan(loan.clone()).await?;
        self.trust
            .adjust(unit.as_mut(), loan.borrower, REASON_LOAN_REPAID, REPAYMENT_REWARD)
            .await?;
        unit.commit().await?;

        info!(loan = %loan.id, %due, "loan repaid");
        let mut effects = SideEffects::new();
        effects
            .notify(Notice::new(
                loan.lender,
                format!("Your loan of {} has been repaid ({due} received).", loan.amount),
                NotificationKind::LoanRepaid,
            ))
            .audit(AuditEvent::new(
                "loan_repaid",
                Some(loan.borrower),
                json!({ "loan": loan.id.to_string(), "amount": due.value().to_string() }),
            ));
        self.effects.dispatch(effects).await;
        Ok(loan)
    }

    /// Committed loan visible to the caller; anyone else gets `NotFound`.
    async fn loan_of(&self, id: LoanId, owns: impl Fn(&Loan) -> bool) -> Result<Loan> {
        self.store
            .loan(id)
            .await?
            .filter(|l| owns(l))
            .ok_or_else(|| SettlementError::not_found("Loan not found."))
    }

    async fn audit(&self, action: &str, holder: Option<HolderId>, details: serde_json::Value) {
        let mut effects = SideEffects::new();
        effects.audit(AuditEvent::new(action, holder, details));
        self.effects.dispatch(effects).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::LedgerStore;
    use crate::infrastructure::audit::InMemoryAuditSink;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use crate::infrastructure::notifications::{InAppNotifier, LogSmsGateway};
    use std::sync::Arc;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        notifier: Arc<InAppNotifier>,
        audit: Arc<InMemoryAuditSink>,
        registry: Registry,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let store: LedgerStoreRef = ledger.clone();
        let notifier = Arc::new(InAppNotifier::new(
            store.clone(),
            Arc::new(LogSmsGateway::new(None)),
        ));
        let audit = Arc::new(InMemoryAuditSink::new());
        let registry = Registry::new(store, EffectDispatcher::new(notifier.clone(), audit.clone()));
        Fixture {
            ledger,
            notifier,
            audit,
            registry,
        }
    }

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn fund(ledger: &InMemoryLedger, holder: HolderId, value: Decimal) {
        let mut unit = ledger.begin(&[holder]).await.unwrap();
        unit.credit(holder, amount(value)).await.unwrap();
        unit.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_holder_opens_wallet() {
        let f = fixture();
        let holder = f.registry.register_holder("100", "Ada", "eur").await.unwrap();

        let account = f.ledger.account(holder.id).await.unwrap().unwrap();
        assert_eq!(account.currency, "EUR");
        assert_eq!(account.balance.value(), dec!(0));
        assert_eq!(holder.trust_score.value(), dec!(50));
        assert_eq!(f.audit.actions().await, vec!["holder_registered"]);

        let dup = f.registry.register_holder("100", "Eve", "USD").await;
        assert!(matches!(dup, Err(SettlementError::InvalidUsage(_))));
        assert_eq!(f.ledger.accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_beneficiary_rules() {
        let f = fixture();
        let a = f.registry.register_holder("100", "Ada", "USD").await.unwrap();
        f.registry.register_holder("200", "Bo", "USD").await.unwrap();

        f.registry.add_beneficiary(a.id, "200", "Bo").await.unwrap();
        let dup = f.registry.add_beneficiary(a.id, "200", "Bobby").await;
        assert!(matches!(dup, Err(SettlementError::InvalidUsage(_))));
        let own = f.registry.add_beneficiary(a.id, "100", "me").await;
        assert!(matches!(own, Err(SettlementError::InvalidUsage(_))));
        let unknown = f.registry.add_beneficiary(a.id, "999", "x").await;
        assert!(matches!(unknown, Err(SettlementError::NotFound(_))));

        let links = f.registry.beneficiaries(a.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].nickname, "Bo");
    }

    #[tokio::test]
    async fn test_one_merchant_per_holder() {
        let f = fixture();
        let a = f.registry.register_holder("100", "Ada", "USD").await.unwrap();

        let merchant = f.registry.register_merchant(a.id, "Ada's Bakery").await.unwrap();
        assert!(uuid::Uuid::parse_str(&merchant.api_key).is_ok());
        let again = f.registry.register_merchant(a.id, "Second Shop").await;
        assert!(matches!(
            again,
            Err(SettlementError::InvalidUsage(ref m)) if m == "User is already registered as a merchant."
        ));
        let existing = f.ledger.merchant_of(a.id).await.unwrap();
        assert_eq!(existing.map(|m| m.business_name), Some("Ada's Bakery".to_string()));

        let found = f.ledger.merchant_by_api_key(&merchant.api_key).await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(merchant.id));
    }

    #[tokio::test]
    async fn test_loan_lifecycle() {
        let f = fixture();
        let lender = f.registry.register_holder("100", "Lena", "USD").await.unwrap();
        let borrower = f.registry.register_holder("200", "Bob", "USD").await.unwrap();
        fund(&f.ledger, lender.id, dec!(500)).await;
        let due = NaiveDate::from_ymd_opt(2030, 1, 31).unwrap();

        let loan = f
            .registry
            .request_loan(borrower.id, "100", amount(dec!(200)), None, due)
            .await
            .unwrap();
        assert_eq!(loan.status, LoanStatus::Requested);
        let inbox = f.notifier.notifications_for(lender.id).await.unwrap();
        assert_eq!(inbox[0].message, "Bob has requested a loan of 200.00 from you.");

        // only the lender may activate
        let wrong = f.registry.activate_loan(borrower.id, loan.id).await;
        assert!(matches!(wrong, Err(SettlementError::NotFound(_))));

        f.registry.activate_loan(lender.id, loan.id).await.unwrap();
        let balance = |id: HolderId| {
            let ledger = f.ledger.clone();
            async move { ledger.account(id).await.unwrap().unwrap().balance.value() }
        };
        assert_eq!(balance(lender.id).await, dec!(300));
        assert_eq!(balance(borrower.id).await, dec!(200));

        fund(&f.ledger, borrower.id, dec!(10)).await;
        let paid = f.registry.repay_loan(borrower.id, loan.id).await.unwrap();
        assert_eq!(paid.status, LoanStatus::Paid);
        // 200 * 1.05
        assert_eq!(balance(lender.id).await, dec!(510));
        assert_eq!(balance(borrower.id).await, dec!(0));
        let score = f.ledger.holder(borrower.id).await.unwrap().unwrap().trust_score;
        assert_eq!(score.value(), dec!(75));

        let twice = f.registry.repay_loan(borrower.id, loan.id).await;
        assert!(matches!(twice, Err(SettlementError::InvalidUsage(_))));
    }

    #[tokio::test]
    async fn test_failed_repayment_leaves_loan_active() {
        let f = fixture();
        let lender = f.registry.register_holder("100", "Lena", "USD").await.unwrap();
        let borrower = f.registry.register_holder("200", "Bob", "USD").await.unwrap();
        fund(&f.ledger, lender.id, dec!(100)).await;
        let due = NaiveDate::from_ymd_opt(2030, 1, 31).unwrap();
        let loan = f
            .registry
            .request_loan(borrower.id, "100", amount(dec!(100)), Some(dec!(10)), due)
            .await
            .unwrap();
        f.registry.activate_loan(lender.id, loan.id).await.unwrap();

        // owes 110 but only holds 100
        let result = f.registry.repay_loan(borrower.id, loan.id).await;
        assert!(matches!(result, Err(SettlementError::InvalidUsage(_))));
        let stored = f.ledger.loan(loan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LoanStatus::Active);
        assert!(f.ledger.trust_history(borrower.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_savings_goal_requires_title() {
        let f = fixture();
        let a = f.registry.register_holder("100", "Ada", "USD").await.unwrap();
        let empty = f
            .registry
            .create_savings_goal(a.id, "  ", amount(dec!(10)), None)
            .await;
        assert!(matches!(empty, Err(SettlementError::InvalidUsage(_))));

        let goal = f
            .registry
            .create_savings_goal(a.id, "Bike", amount(dec!(300)), None)
            .await
            .unwrap();
        assert_eq!(f.ledger.goals_of(a.id).await.unwrap(), vec![goal]);
    }
}
