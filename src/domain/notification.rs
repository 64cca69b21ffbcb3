use super::ids::{HolderId, NotificationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TransferReceived,
    LoanRequest,
    LoanActivated,
    LoanRepaid,
    LoanDefaulted,
}

/// In-app notification delivered to a holder's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub holder: HolderId,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn unread(holder: HolderId, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: NotificationId::generate(),
            holder,
            message: message.into(),
            kind,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// A notification queued during a unit of work and dispatched after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub holder: HolderId,
    pub message: String,
    pub kind: NotificationKind,
    pub send_sms: bool,
}

impl Notice {
    pub fn new(holder: HolderId, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            holder,
            message: message.into(),
            kind,
            send_sms: false,
        }
    }

    pub fn with_sms(mut self) -> Self {
        self.send_sms = true;
        self
    }
}
