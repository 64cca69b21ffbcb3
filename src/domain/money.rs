use crate::error::SettlementError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits carried by every stored monetary value.
pub const MONEY_SCALE: u32 = 4;

const OVERFLOW_MESSAGE: &str = "Amount exceeds the maximum supported value.";

/// Rounds a computed value (fee, converted amount) to the stored precision.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A non-negative monetary value with 4 decimal places precision.
///
/// Subtraction is only available through [`Balance::checked_sub`], so a
/// balance can never be driven below zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

/// A strictly positive monetary amount for a money movement.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value <= Decimal::ZERO {
            return Err(SettlementError::invalid("Amount must be positive."));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(SettlementError::invalid(format!(
                "Amount must have at most {MONEY_SCALE} decimal places."
            )));
        }
        Ok(Self(value))
    }

    /// Parses a caller-supplied decimal string.
    pub fn parse(raw: &str) -> Result<Self, SettlementError> {
        let value: Decimal = raw
            .trim()
            .parse()
            .map_err(|_| SettlementError::invalid(format!("Invalid amount format: '{raw}'.")))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `self + extra`, e.g. an amount plus its fee.
    pub fn checked_plus(self, extra: Decimal) -> Result<Self, SettlementError> {
        let total = self
            .0
            .checked_add(extra)
            .ok_or_else(|| SettlementError::invalid(OVERFLOW_MESSAGE))?;
        Self::new(total)
    }

    /// `self * factor` rounded to [`MONEY_SCALE`] places.
    pub fn checked_times(self, factor: Decimal) -> Result<Self, SettlementError> {
        let product = self
            .0
            .checked_mul(factor)
            .ok_or_else(|| SettlementError::invalid(OVERFLOW_MESSAGE))?;
        Self::new(round_money(product))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Returns `None` for negative values.
    pub fn new(value: Decimal) -> Option<Self> {
        (value >= Decimal::ZERO).then_some(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        self.covers(amount).then(|| Self(self.0 - amount.0))
    }

    /// Fails if the result would not fit in a `Decimal`.
    pub fn credited(self, amount: Amount) -> Result<Self, SettlementError> {
        self.0
            .checked_add(amount.0)
            .map(Self)
            .ok_or_else(|| SettlementError::invalid(OVERFLOW_MESSAGE))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.normalize().fmt(f)
    }
}
