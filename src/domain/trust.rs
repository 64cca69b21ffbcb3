use super::ids::{HolderId, TrustRecordId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reputation metric bounded to `[0, 999]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustScore(Decimal);

impl TrustScore {
    pub const MIN: Decimal = dec!(0);
    pub const MAX: Decimal = dec!(999);
    pub const INITIAL: Self = Self(dec!(50));

    pub fn clamped(value: Decimal) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn adjusted(self, delta: Decimal) -> Self {
        Self::clamped(self.0 + delta)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.normalize().fmt(f)
    }
}

/// Append-only history entry: the score that resulted from one change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreRecord {
    pub id: TrustRecordId,
    pub holder: HolderId,
    pub score: TrustScore,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl TrustScoreRecord {
    pub fn new(holder: HolderId, score: TrustScore, reason: impl Into<String>) -> Self {
        Self {
            id: TrustRecordId::generate(),
            holder,
            score,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}
