use super::ids::{EntryId, HolderId};
use super::money::Amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const CATEGORY_UNCATEGORIZED: &str = "Uncategorized";
pub const CATEGORY_INCOME: &str = "Income";
pub const CATEGORY_WITHDRAWALS: &str = "Withdrawals";
pub const CATEGORY_SAVINGS: &str = "Savings";
pub const CATEGORY_CROSS_BORDER: &str = "Cross-Border";
pub const CATEGORY_FINANCIAL_SERVICES: &str = "Financial Services";
pub const CATEGORY_GOODS_AND_SERVICES: &str = "Goods & Services";
pub const CATEGORY_LOANS: &str = "Loans";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Transfer,
    Deposit,
    Withdrawal,
    SavingsDeposit,
    InsurancePurchase,
    MerchantPayment,
    MulticurrencyTransfer,
    LoanDisbursement,
    LoanRepayment,
}

impl EntryType {
    /// Default classification tag for entries of this type.
    pub fn default_category(&self) -> &'static str {
        match self {
            EntryType::Transfer => CATEGORY_UNCATEGORIZED,
            EntryType::Deposit => CATEGORY_INCOME,
            EntryType::Withdrawal => CATEGORY_WITHDRAWALS,
            EntryType::SavingsDeposit => CATEGORY_SAVINGS,
            EntryType::InsurancePurchase => CATEGORY_FINANCIAL_SERVICES,
            EntryType::MerchantPayment => CATEGORY_GOODS_AND_SERVICES,
            EntryType::MulticurrencyTransfer => CATEGORY_CROSS_BORDER,
            EntryType::LoanDisbursement | EntryType::LoanRepayment => CATEGORY_LOANS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
}

/// Immutable record of one completed money movement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub sender: HolderId,
    pub receiver: HolderId,
    pub amount: Amount,
    pub fee: Decimal,
    pub currency: String,
    pub status: EntryStatus,
    pub r#type: EntryType,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A completed entry with no fee, categorized by its type.
    pub fn completed(
        r#type: EntryType,
        sender: HolderId,
        receiver: HolderId,
        amount: Amount,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            sender,
            receiver,
            amount,
            fee: Decimal::ZERO,
            currency: currency.into(),
            status: EntryStatus::Completed,
            r#type,
            category: r#type.default_category().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Self-to-self entry (deposit, withdrawal, savings, premium).
    pub fn internal(
        r#type: EntryType,
        holder: HolderId,
        amount: Amount,
        currency: impl Into<String>,
    ) -> Self {
        Self::completed(r#type, holder, holder, amount, currency)
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    /// Whether this entry moved value from `holder` to someone else.
    pub fn is_outbound_from(&self, holder: HolderId) -> bool {
        self.sender == holder && self.receiver != holder
    }
}
