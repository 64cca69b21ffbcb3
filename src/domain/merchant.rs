use super::ids::{HolderId, MerchantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Merchant identity of a holder. Settles into the holder's primary wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub holder: HolderId,
    pub business_name: String,
    /// Opaque bearer credential.
    pub api_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new(holder: HolderId, business_name: impl Into<String>) -> Self {
        Self {
            id: MerchantId::generate(),
            holder,
            business_name: business_name.into(),
            api_key: Uuid::new_v4().to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
