use super::ids::{HolderId, LoanId};
use super::money::Amount;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTEREST_RATE: Decimal = rust_decimal_macros::dec!(5.0);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Requested,
    Active,
    Paid,
    Defaulted,
}

impl LoanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Paid | LoanStatus::Defaulted)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub lender: HolderId,
    pub borrower: HolderId,
    pub amount: Amount,
    /// Percentage, e.g. `5.0` for 5%.
    pub interest_rate: Decimal,
    pub status: LoanStatus,
    pub repayment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn request(
        lender: HolderId,
        borrower: HolderId,
        amount: Amount,
        interest_rate: Decimal,
        repayment_date: NaiveDate,
    ) -> Self {
        Self {
            id: LoanId::generate(),
            lender,
            borrower,
            amount,
            interest_rate,
            status: LoanStatus::Requested,
            repayment_date,
            created_at: Utc::now(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active && self.repayment_date < today
    }

    /// Principal plus simple interest.
    pub fn amount_due(&self) -> Result<Amount> {
        let factor = (self.interest_rate / Decimal::ONE_HUNDRED)
            .checked_add(Decimal::ONE)
            .ok_or_else(|| SettlementError::invalid("Interest rate is too large."))?;
        self.amount.checked_times(factor)
    }

    /// Moves the loan along its lifecycle; terminal states are immutable.
    pub fn transition(&mut self, to: LoanStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (LoanStatus::Requested, LoanStatus::Active)
                | (LoanStatus::Active, LoanStatus::Paid)
                | (LoanStatus::Active, LoanStatus::Defaulted)
        );
        if !allowed {
            return Err(SettlementError::invalid(format!(
                "Loan {} cannot move from {:?} to {:?}.",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}
