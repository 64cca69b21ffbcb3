use super::ids::HolderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub holder: Option<HolderId>,
    pub details: Value,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, holder: Option<HolderId>, details: Value) -> Self {
        Self {
            action: action.into(),
            holder,
            details,
            at: Utc::now(),
        }
    }
}
