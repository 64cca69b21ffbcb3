//! Transactional ledger over a plain key/value backend.
//!
//! Every record type lives in its own [`Table`] as JSON. A [`LedgerUnit`]
//! stages writes in memory while holding per-holder locks and hands them to the
//! backend as one atomic batch on commit.

use crate::domain::account::{Account, AccountStatus, SavingsGoal};
use crate::domain::beneficiary::BeneficiaryLink;
use crate::domain::holder::Holder;
use crate::domain::ids::{EntryId, GoalId, HolderId, LoanId, ProductId};
use crate::domain::insurance::{InsurancePolicy, InsuranceProduct};
use crate::domain::ledger::{EntryType, LedgerEntry};
use crate::domain::loan::Loan;
use crate::domain::merchant::Merchant;
use crate::domain::money::Amount;
use crate::domain::notification::Notification;
use crate::domain::ports::{LedgerStore, UnitOfWork};
use crate::domain::trust::{TrustScore, TrustScoreRecord};
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Logical tables. Each maps to a column family on RocksDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Holders,
    Accounts,
    Goals,
    Entries,
    TrustHistory,
    Beneficiaries,
    Loans,
    Merchants,
    Products,
    Policies,
    Notifications,
    PhoneIndex,
    MerchantHolderIndex,
    MerchantKeyIndex,
    BeneficiaryPairIndex,
}

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Holders,
        Table::Accounts,
        Table::Goals,
        Table::Entries,
        Table::TrustHistory,
        Table::Beneficiaries,
        Table::Loans,
        Table::Merchants,
        Table::Products,
        Table::Policies,
        Table::Notifications,
        Table::PhoneIndex,
        Table::MerchantHolderIndex,
        Table::MerchantKeyIndex,
        Table::BeneficiaryPairIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Holders => "holders",
            Table::Accounts => "accounts",
            Table::Goals => "savings_goals",
            Table::Entries => "ledger_entries",
            Table::TrustHistory => "trust_history",
            Table::Beneficiaries => "beneficiaries",
            Table::Loans => "loans",
            Table::Merchants => "merchants",
            Table::Products => "insurance_products",
            Table::Policies => "insurance_policies",
            Table::Notifications => "notifications",
            Table::PhoneIndex => "idx_holder_phone",
            Table::MerchantHolderIndex => "idx_merchant_holder",
            Table::MerchantKeyIndex => "idx_merchant_api_key",
            Table::BeneficiaryPairIndex => "idx_beneficiary_pair",
        }
    }
}

/// A single put in a write batch.
pub type Put = (Table, Vec<u8>, Vec<u8>);

/// Raw storage underneath a [`Ledger`].
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    async fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// All rows of a table in key order.
    async fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
    /// Applies every put or none of them.
    async fn write(&self, batch: Vec<Put>) -> Result<()>;
}

/// A record stored as JSON under a typed key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: Table;
    fn key(&self) -> Vec<u8>;
}

macro_rules! impl_record {
    ($ty:ty, $table:expr, |$r:ident| $key:expr) => {
        impl Record for $ty {
            const TABLE: Table = $table;
            fn key(&self) -> Vec<u8> {
                let $r = self;
                $key.as_bytes().to_vec()
            }
        }
    };
}

impl_record!(Holder, Table::Holders, |r| r.id);
impl_record!(Account, Table::Accounts, |r| r.holder);
impl_record!(SavingsGoal, Table::Goals, |r| r.id);
impl_record!(LedgerEntry, Table::Entries, |r| r.id);
impl_record!(TrustScoreRecord, Table::TrustHistory, |r| r.id);
impl_record!(BeneficiaryLink, Table::Beneficiaries, |r| r.id);
impl_record!(Loan, Table::Loans, |r| r.id);
impl_record!(Merchant, Table::Merchants, |r| r.id);
impl_record!(InsuranceProduct, Table::Products, |r| r.id);
impl_record!(InsurancePolicy, Table::Policies, |r| r.id);
impl_record!(Notification, Table::Notifications, |r| r.id);

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn pair_key(owner: HolderId, counterparty: HolderId) -> Vec<u8> {
    let mut key = owner.as_bytes().to_vec();
    key.extend_from_slice(counterparty.as_bytes());
    key
}

async fn get_record<B: KvBackend, T: Record>(backend: &B, key: &[u8]) -> Result<Option<T>> {
    backend
        .get(T::TABLE, key)
        .await?
        .map(|bytes| decode(&bytes))
        .transpose()
}

async fn scan_records<B: KvBackend, T: Record>(backend: &B) -> Result<Vec<T>> {
    backend
        .scan(T::TABLE)
        .await?
        .iter()
        .map(|(_, bytes)| decode(bytes))
        .collect()
}

/// Per-holder exclusive locks.
///
/// Scopes are locked in sorted order, so two units over overlapping holders
/// cannot deadlock.
#[derive(Default)]
pub struct LockTable {
    locks: DashMap<HolderId, Arc<Mutex<()>>>,
}

impl LockTable {
    pub async fn acquire(&self, scope: &[HolderId]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered = scope.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for holder in ordered {
            let lock = self.locks.entry(holder).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// A key that must not already exist when the unit commits.
struct UniqueClaim {
    table: Table,
    key: Vec<u8>,
    value: Vec<u8>,
    conflict: String,
}

struct Shared<B> {
    backend: B,
    locks: LockTable,
    /// Serializes the uniqueness check and the batch write of each commit.
    commit_lock: Mutex<()>,
}

/// [`LedgerStore`] implementation shared by every backend.
pub struct Ledger<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for Ledger<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: KvBackend> Ledger<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                locks: LockTable::default(),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    async fn get<T: Record>(&self, key: &[u8]) -> Result<Option<T>> {
        get_record(&self.shared.backend, key).await
    }

    async fn scan<T: Record>(&self) -> Result<Vec<T>> {
        scan_records(&self.shared.backend).await
    }
}

#[async_trait]
impl<B: KvBackend> LedgerStore for Ledger<B> {
    async fn begin(&self, scope: &[HolderId]) -> Result<Box<dyn UnitOfWork>> {
        let guards = self.shared.locks.acquire(scope).await;
        Ok(Box::new(LedgerUnit {
            shared: Arc::clone(&self.shared),
            scope: scope.to_vec(),
            staged: BTreeMap::new(),
            claims: Vec::new(),
            appended: HashSet::new(),
            _guards: guards,
        }))
    }

    async fn holder(&self, id: HolderId) -> Result<Option<Holder>> {
        self.get(id.as_bytes()).await
    }

    async fn holder_by_phone(&self, phone: &str) -> Result<Option<Holder>> {
        match self.shared.backend.get(Table::PhoneIndex, phone.as_bytes()).await? {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    async fn account(&self, holder: HolderId) -> Result<Option<Account>> {
        self.get(holder.as_bytes()).await
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.scan().await
    }

    async fn goal(&self, id: GoalId) -> Result<Option<SavingsGoal>> {
        self.get(id.as_bytes()).await
    }

    async fn goals_of(&self, holder: HolderId) -> Result<Vec<SavingsGoal>> {
        let goals: Vec<SavingsGoal> = self.scan().await?;
        Ok(goals.into_iter().filter(|g| g.holder == holder).collect())
    }

    async fn entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        self.get(id.as_bytes()).await
    }

    async fn entries_for(&self, holder: HolderId) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self.scan().await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.sender == holder || e.receiver == holder)
            .collect())
    }

    async fn trust_history(&self, holder: HolderId) -> Result<Vec<TrustScoreRecord>> {
        let records: Vec<TrustScoreRecord> = self.scan().await?;
        Ok(records.into_iter().filter(|r| r.holder == holder).collect())
    }

    async fn beneficiaries(&self, owner: HolderId) -> Result<Vec<BeneficiaryLink>> {
        let links: Vec<BeneficiaryLink> = self.scan().await?;
        Ok(links.into_iter().filter(|l| l.owner == owner).collect())
    }

    async fn is_beneficiary(&self, owner: HolderId, counterparty: HolderId) -> Result<bool> {
        let key = pair_key(owner, counterparty);
        Ok(self
            .shared
            .backend
            .get(Table::BeneficiaryPairIndex, &key)
            .await?
            .is_some())
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        self.get(id.as_bytes()).await
    }

    async fn loans_overdue(&self, today: NaiveDate) -> Result<Vec<Loan>> {
        let loans: Vec<Loan> = self.scan().await?;
        Ok(loans
            .into_iter()
            .filter(|l| l.is_overdue(today))
            .collect())
    }

    async fn merchant_by_api_key(&self, api_key: &str) -> Result<Option<Merchant>> {
        match self
            .shared
            .backend
            .get(Table::MerchantKeyIndex, api_key.as_bytes())
            .await?
        {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    async fn merchant_of(&self, holder: HolderId) -> Result<Option<Merchant>> {
        match self
            .shared
            .backend
            .get(Table::MerchantHolderIndex, holder.as_bytes())
            .await?
        {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    async fn insurance_product(&self, id: ProductId) -> Result<Option<InsuranceProduct>> {
        self.get(id.as_bytes()).await
    }

    async fn policies_of(&self, holder: HolderId) -> Result<Vec<InsurancePolicy>> {
        let policies: Vec<InsurancePolicy> = self.scan().await?;
        Ok(policies.into_iter().filter(|p| p.holder == holder).collect())
    }

    async fn notifications_for(&self, holder: HolderId) -> Result<Vec<Notification>> {
        let inbox: Vec<Notification> = self.scan().await?;
        Ok(inbox.into_iter().filter(|n| n.holder == holder).collect())
    }
}

/// Staged writes plus the locks that make them safe to apply.
pub struct LedgerUnit<B> {
    shared: Arc<Shared<B>>,
    scope: Vec<HolderId>,
    staged: BTreeMap<(Table, Vec<u8>), Vec<u8>>,
    claims: Vec<UniqueClaim>,
    appended: HashSet<EntryId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl<B: KvBackend> LedgerUnit<B> {
    fn ensure_locked(&self, holder: HolderId) -> Result<()> {
        if self.scope.contains(&holder) {
            Ok(())
        } else {
            Err(SettlementError::internal(format!(
                "holder {holder} is not locked by this unit of work"
            )))
        }
    }

    async fn read<T: Record>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.staged.get(&(T::TABLE, key.to_vec())) {
            Some(bytes) => decode(bytes).map(Some),
            None => get_record(&self.shared.backend, key).await,
        }
    }

    /// Committed rows overlaid with this unit's staged rows.
    async fn read_all<T: Record>(&self) -> Result<Vec<T>> {
        let mut rows: BTreeMap<Vec<u8>, Vec<u8>> = self
            .shared
            .backend
            .scan(T::TABLE)
            .await?
            .into_iter()
            .collect();
        for ((table, key), bytes) in &self.staged {
            if *table == T::TABLE {
                rows.insert(key.clone(), bytes.clone());
            }
        }
        rows.values().map(|bytes| decode(bytes)).collect()
    }

    fn stage<T: Record>(&mut self, record: &T) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.staged.insert((T::TABLE, record.key()), bytes);
        Ok(())
    }

    fn claim(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>, conflict: String) -> Result<()> {
        if self.claims.iter().any(|c| c.table == table && c.key == key) {
            return Err(SettlementError::InvalidUsage(conflict));
        }
        self.claims.push(UniqueClaim {
            table,
            key,
            value,
            conflict,
        });
        Ok(())
    }

    async fn locked_account(&self, holder: HolderId) -> Result<Account> {
        self.ensure_locked(holder)?;
        self.read::<Account>(holder.as_bytes())
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("Account for holder {holder} not found.")))
    }
}

#[async_trait]
impl<B: KvBackend> UnitOfWork for LedgerUnit<B> {
    async fn holder(&mut self, id: HolderId) -> Result<Option<Holder>> {
        self.read(id.as_bytes()).await
    }

    async fn account(&mut self, holder: HolderId) -> Result<Option<Account>> {
        self.read(holder.as_bytes()).await
    }

    async fn debit(&mut self, holder: HolderId, amount: Amount) -> Result<Account> {
        let mut account = self.locked_account(holder).await?;
        account.debit(amount)?;
        self.stage(&account)?;
        Ok(account)
    }

    async fn credit(&mut self, holder: HolderId, amount: Amount) -> Result<Account> {
        let mut account = self.locked_account(holder).await?;
        account.credit(amount)?;
        self.stage(&account)?;
        Ok(account)
    }

    async fn redenominate(&mut self, holder: HolderId, currency: &str) -> Result<Account> {
        let mut account = self.locked_account(holder).await?;
        account.currency = currency.to_string();
        self.stage(&account)?;
        Ok(account)
    }

    async fn set_account_status(
        &mut self,
        holder: HolderId,
        status: AccountStatus,
    ) -> Result<Account> {
        let mut account = self.locked_account(holder).await?;
        account.status = status;
        self.stage(&account)?;
        Ok(account)
    }

    async fn open_account(&mut self, account: Account) -> Result<()> {
        self.ensure_locked(account.holder)?;
        if self.read::<Account>(&account.key()).await?.is_some() {
            return Err(SettlementError::invalid(format!(
                "Holder {} already has a wallet.",
                account.holder
            )));
        }
        self.stage(&account)
    }

    async fn append_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry> {
        self.ensure_locked(entry.sender)?;
        self.ensure_locked(entry.receiver)?;
        if self.read::<LedgerEntry>(&entry.key()).await?.is_some() {
            return Err(SettlementError::internal(format!(
                "ledger entry {} already exists",
                entry.id
            )));
        }
        self.stage(&entry)?;
        self.appended.insert(entry.id);
        Ok(entry)
    }

    async fn reclassify_entry(
        &mut self,
        id: EntryId,
        r#type: EntryType,
        category: &str,
    ) -> Result<LedgerEntry> {
        if !self.appended.contains(&id) {
            return Err(SettlementError::internal(format!(
                "ledger entry {id} is immutable outside the unit that created it"
            )));
        }
        let mut entry: LedgerEntry = self
            .read(id.as_bytes())
            .await?
            .ok_or_else(|| SettlementError::internal(format!("staged entry {id} vanished")))?;
        entry.r#type = r#type;
        entry.category = category.to_string();
        self.stage(&entry)?;
        Ok(entry)
    }

    async fn entries_sent_by(&mut self, holder: HolderId) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self.read_all().await?;
        Ok(entries.into_iter().filter(|e| e.sender == holder).collect())
    }

    async fn record_trust_score(
        &mut self,
        holder: HolderId,
        score: TrustScore,
        reason: &str,
    ) -> Result<TrustScoreRecord> {
        self.ensure_locked(holder)?;
        let mut current: Holder = self
            .read(holder.as_bytes())
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("Holder {holder} not found.")))?;
        current.trust_score = score;
        self.stage(&current)?;

        let record = TrustScoreRecord::new(holder, score, reason);
        self.stage(&record)?;
        Ok(record)
    }

    async fn goal(&mut self, id: GoalId) -> Result<Option<SavingsGoal>> {
        self.read(id.as_bytes()).await
    }

    async fn goals_of(&mut self, holder: HolderId) -> Result<Vec<SavingsGoal>> {
        let goals: Vec<SavingsGoal> = self.read_all().await?;
        Ok(goals.into_iter().filter(|g| g.holder == holder).collect())
    }

    async fn put_goal(&mut self, goal: SavingsGoal) -> Result<()> {
        self.ensure_locked(goal.holder)?;
        self.stage(&goal)
    }

    async fn loan(&mut self, id: LoanId) -> Result<Option<Loan>> {
        self.read(id.as_bytes()).await
    }

    async fn put_loan(&mut self, loan: Loan) -> Result<()> {
        self.ensure_locked(loan.lender)?;
        self.ensure_locked(loan.borrower)?;
        if let Some(existing) = self.read::<Loan>(&loan.key()).await?
            && existing.status.is_terminal()
        {
            return Err(SettlementError::invalid(format!(
                "Loan {} is closed and can no longer change.",
                loan.id
            )));
        }
        self.stage(&loan)
    }

    async fn insert_holder(&mut self, holder: Holder) -> Result<()> {
        self.ensure_locked(holder.id)?;
        self.claim(
            Table::PhoneIndex,
            holder.phone.as_bytes().to_vec(),
            holder.key(),
            format!("Phone number {} is already registered.", holder.phone),
        )?;
        self.stage(&holder)
    }

    async fn insert_merchant(&mut self, merchant: Merchant) -> Result<()> {
        self.ensure_locked(merchant.holder)?;
        self.claim(
            Table::MerchantHolderIndex,
            merchant.holder.as_bytes().to_vec(),
            merchant.key(),
            "User already has a merchant account.".to_string(),
        )?;
        self.claim(
            Table::MerchantKeyIndex,
            merchant.api_key.as_bytes().to_vec(),
            merchant.key(),
            "Merchant API key collision.".to_string(),
        )?;
        self.stage(&merchant)
    }

    async fn insert_beneficiary(&mut self, link: BeneficiaryLink) -> Result<()> {
        self.ensure_locked(link.owner)?;
        self.claim(
            Table::BeneficiaryPairIndex,
            pair_key(link.owner, link.counterparty),
            link.key(),
            "This user is already a beneficiary.".to_string(),
        )?;
        self.stage(&link)
    }

    async fn insert_policy(&mut self, policy: InsurancePolicy) -> Result<()> {
        self.ensure_locked(policy.holder)?;
        self.stage(&policy)
    }

    async fn put_insurance_product(&mut self, product: InsuranceProduct) -> Result<()> {
        self.stage(&product)
    }

    async fn put_notification(&mut self, notification: Notification) -> Result<()> {
        self.ensure_locked(notification.holder)?;
        self.stage(&notification)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let LedgerUnit {
            shared,
            staged,
            claims,
            _guards,
            ..
        } = *self;

        let _commit = shared.commit_lock.lock().await;
        for claim in &claims {
            if shared.backend.get(claim.table, &claim.key).await?.is_some() {
                return Err(SettlementError::InvalidUsage(claim.conflict.clone()));
            }
        }

        let mut batch: Vec<Put> = staged
            .into_iter()
            .map(|((table, key), value)| (table, key, value))
            .collect();
        batch.extend(claims.into_iter().map(|c| (c.table, c.key, c.value)));
        shared.backend.write(batch).await?;
        drop(_guards);
        Ok(())
    }
}
