use super::ids::{HolderId, PolicyId, ProductId};
use super::money::Amount;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const POLICY_TERM_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub coverage_amount: Amount,
    pub premium_amount: Amount,
    pub is_active: bool,
}

impl InsuranceProduct {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        coverage_amount: Amount,
        premium_amount: Amount,
    ) -> Self {
        Self {
            id: ProductId::generate(),
            name: name.into(),
            description: description.into(),
            coverage_amount,
            premium_amount,
            is_active: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Active,
    Expired,
    Claimed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: PolicyId,
    pub holder: HolderId,
    pub product: ProductId,
    pub status: PolicyStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl InsurancePolicy {
    pub fn start(holder: HolderId, product: ProductId) -> Self {
        let start_date = Utc::now();
        Self {
            id: PolicyId::generate(),
            holder,
            product,
            status: PolicyStatus::Active,
            start_date,
            end_date: start_date + Duration::days(POLICY_TERM_DAYS),
        }
    }
}
