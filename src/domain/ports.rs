use super::account::{Account, AccountStatus, SavingsGoal};
use super::audit::AuditEvent;
use super::beneficiary::BeneficiaryLink;
use super::holder::Holder;
use super::ids::{EntryId, GoalId, HolderId, LoanId, ProductId};
use super::insurance::{InsurancePolicy, InsuranceProduct};
use super::ledger::{EntryType, LedgerEntry};
use super::loan::Loan;
use super::merchant::Merchant;
use super::money::Amount;
use super::notification::{Notification, NotificationKind};
use super::trust::{TrustScore, TrustScoreRecord};
use crate::error::{RateProviderError, Result, SmsError};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Owner of balances and the transaction log.
///
/// Balances are only ever changed through a [`UnitOfWork`]; the query methods
/// here read committed state without taking locks.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a unit of work holding exclusive locks on every holder in `scope`.
    async fn begin(&self, scope: &[HolderId]) -> Result<Box<dyn UnitOfWork>>;

    async fn holder(&self, id: HolderId) -> Result<Option<Holder>>;
    async fn holder_by_phone(&self, phone: &str) -> Result<Option<Holder>>;
    async fn account(&self, holder: HolderId) -> Result<Option<Account>>;
    async fn accounts(&self) -> Result<Vec<Account>>;
    async fn goal(&self, id: GoalId) -> Result<Option<SavingsGoal>>;
    async fn goals_of(&self, holder: HolderId) -> Result<Vec<SavingsGoal>>;
    async fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>>;
    /// Entries where the holder is sender or receiver, oldest first.
    async fn entries_for(&self, holder: HolderId) -> Result<Vec<LedgerEntry>>;
    /// Trust history, oldest first.
    async fn trust_history(&self, holder: HolderId) -> Result<Vec<TrustScoreRecord>>;
    async fn beneficiaries(&self, owner: HolderId) -> Result<Vec<BeneficiaryLink>>;
    async fn is_beneficiary(&self, owner: HolderId, counterparty: HolderId) -> Result<bool>;
    async fn loan(&self, id: LoanId) -> Result<Option<Loan>>;
    /// Active loans whose repayment date is strictly before `today`.
    async fn loans_overdue(&self, today: NaiveDate) -> Result<Vec<Loan>>;
    async fn merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>>;
    async fn merchant_of(&self, holder: HolderId) -> Result<Option<Merchant>>;
    async fn insurance_product(&self, id: ProductId) -> Result<Option<InsuranceProduct>>;
    async fn policies_of(&self, holder: HolderId) -> Result<Vec<InsurancePolicy>>;
    /// In-app inbox, oldest first.
    async fn notifications_for(&self, holder: HolderId) -> Result<Vec<Notification>>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;

/// One all-or-nothing unit of work.
///
/// Writes are staged and become visible to other readers only on
/// [`UnitOfWork::commit`]. Dropping the unit without committing discards them.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn holder(&mut self, id: HolderId) -> Result<Option<Holder>>;
    async fn account(&mut self, holder: HolderId) -> Result<Option<Account>>;

    /// Fails with `InvalidUsage` if the balance does not cover `amount`.
    async fn debit(&mut self, holder: HolderId, amount: Amount) -> Result<Account>;
    async fn credit(&mut self, holder: HolderId, amount: Amount) -> Result<Account>;
    async fn redenominate(&mut self, holder: HolderId, currency: &str) -> Result<Account>;
    async fn set_account_status(
        &mut self,
        holder: HolderId,
        status: AccountStatus,
    ) -> Result<Account>;
    /// Fails if the holder already has an account.
    async fn open_account(&mut self, account: Account) -> Result<()>;

    async fn append_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry>;
    /// Only entries appended in this same unit may be reclassified.
    async fn reclassify_entry(
        &mut self,
        id: EntryId,
        r#type: EntryType,
        category: &str,
    ) -> Result<LedgerEntry>;
    async fn entries_sent_by(&mut self, holder: HolderId) -> Result<Vec<LedgerEntry>>;

    /// Writes the holder's current score and appends the matching history record.
    async fn record_trust_score(
        &mut self,
        holder: HolderId,
        score: TrustScore,
        reason: &str,
    ) -> Result<TrustScoreRecord>;

    async fn goal(&mut self, id: GoalId) -> Result<Option<SavingsGoal>>;
    async fn goals_of(&mut self, holder: HolderId) -> Result<Vec<SavingsGoal>>;
    async fn put_goal(&mut self, goal: SavingsGoal) -> Result<()>;

    async fn loan(&mut self, id: LoanId) -> Result<Option<Loan>>;
    async fn put_loan(&mut self, loan: Loan) -> Result<()>;

    /// Registers a holder; the phone number must be unique.
    async fn insert_holder(&mut self, holder: Holder) -> Result<()>;
    /// One merchant per holder, unique API key.
    async fn insert_merchant(&mut self, merchant: Merchant) -> Result<()>;
    /// Unique per (owner, counterparty).
    async fn insert_beneficiary(&mut self, link: BeneficiaryLink) -> Result<()>;
    async fn insert_policy(&mut self, policy: InsurancePolicy) -> Result<()>;
    async fn put_insurance_product(&mut self, product: InsuranceProduct) -> Result<()>;
    /// Inserts or overwrites an inbox row of a locked holder.
    async fn put_notification(&mut self, notification: Notification) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// External source of exchange rates.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// All known rates from `base` to other currencies.
    async fn fetch(
        &self,
        base: &str,
    ) -> std::result::Result<HashMap<String, Decimal>, RateProviderError>;
}

/// Delivers holder notifications. Failures are reported, never fatal.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        holder: HolderId,
        message: &str,
        kind: NotificationKind,
        send_sms: bool,
    ) -> Result<()>;
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Returns a provider message id.
    async fn send(&self, to_phone: &str, body: &str) -> std::result::Result<String, SmsError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}
