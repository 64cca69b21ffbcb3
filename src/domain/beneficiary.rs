use super::ids::{BeneficiaryId, HolderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directed edge owner -> counterparty. Unique per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryLink {
    pub id: BeneficiaryId,
    pub owner: HolderId,
    pub counterparty: HolderId,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

impl BeneficiaryLink {
    pub fn new(owner: HolderId, counterparty: HolderId, nickname: impl Into<String>) -> Self {
        Self {
            id: BeneficiaryId::generate(),
            owner,
            counterparty,
            nickname: nickname.into(),
            created_at: Utc::now(),
        }
    }
}
