use super::ids::{GoalId, HolderId};
use super::money::{Amount, Balance};
use crate::error::{Result, SettlementError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

/// Validates and upper-cases an ISO-4217 style currency code.
pub fn currency_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(SettlementError::invalid(format!(
            "Invalid currency code: '{raw}'."
        )))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Frozen,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
        }
    }
}

/// A holder's primary wallet. Exactly one per holder.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub holder: HolderId,
    pub currency: String,
    pub balance: Balance,
    pub status: AccountStatus,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(holder: HolderId, currency: impl Into<String>) -> Self {
        Self {
            holder,
            currency: currency.into(),
            balance: Balance::ZERO,
            status: AccountStatus::Active,
            updated_at: Utc::now(),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Frozen => Err(SettlementError::invalid(format!(
                "Account of holder {} is frozen.",
                self.holder
            ))),
        }
    }

    /// Decreases the balance, failing without change if funds are insufficient.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        self.ensure_active()?;
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| SettlementError::invalid("Insufficient funds."))?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Increases the balance. There is no upper bound.
    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        self.ensure_active()?;
        self.balance = self.balance.credited(amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A secondary balance bound to one holder, tracked apart from the wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SavingsGoal {
    pub id: GoalId,
    pub holder: HolderId,
    pub title: String,
    pub target_amount: Amount,
    pub current_amount: Balance,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn new(
        holder: HolderId,
        title: impl Into<String>,
        target_amount: Amount,
        deadline: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: GoalId::generate(),
            holder,
            title: title.into(),
            target_amount,
            current_amount: Balance::ZERO,
            deadline,
            created_at: Utc::now(),
        }
    }

    pub fn contribute(&mut self, amount: Amount) -> Result<()> {
        self.current_amount = self.current_amount.credited(amount)?;
        Ok(())
    }

    pub fn is_reached(&self) -> bool {
        self.current_amount.value() >= self.target_amount.value()
    }
}
