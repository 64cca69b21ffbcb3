use super::ids::HolderId;
use super::trust::TrustScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account holder.
///
/// `trust_score` is a denormalized cache of the latest trust history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holder {
    pub id: HolderId,
    pub phone: String,
    pub first_name: String,
    pub trust_score: TrustScore,
    pub created_at: DateTime<Utc>,
}

impl Holder {
    pub fn new(phone: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            id: HolderId::generate(),
            phone: phone.into(),
            first_name: first_name.into(),
            trust_score: TrustScore::INITIAL,
            created_at: Utc::now(),
        }
    }
}
