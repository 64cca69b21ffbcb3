use crate::domain::ids::HolderId;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::{LedgerStoreRef, NotificationDispatcher, SmsGateway};
use crate::error::{Result, SettlementError, SmsError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SMS_PREFIX: &str = "MoneyTransferApp: ";

/// Writes every notification to the holder's inbox in the ledger and
/// optionally texts it.
///
/// SMS is best effort: gateway failures are logged and swallowed.
pub struct InAppNotifier {
    store: LedgerStoreRef,
    sms: Arc<dyn SmsGateway>,
}

impl InAppNotifier {
    pub fn new(store: LedgerStoreRef, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }

    /// Inbox of a holder, oldest first.
    pub async fn notifications_for(&self, holder: HolderId) -> Result<Vec<Notification>> {
        self.store.notifications_for(holder).await
    }

    /// Flags every unread notification of `holder` as read and returns how many changed.
    pub async fn mark_read(&self, holder: HolderId) -> Result<usize> {
        let mut unit = self.store.begin(&[holder]).await?;
        let unread: Vec<Notification> = self
            .store
            .notifications_for(holder)
            .await?
            .into_iter()
            .filter(|n| !n.is_read)
            .collect();
        let marked = unread.len();
        for mut notification in unread {
            notification.is_read = true;
            unit.put_notification(notification).await?;
        }
        unit.commit().await?;
        debug!(%holder, marked, "Inbox marked read");
        Ok(marked)
    }
}

#[async_trait]
impl NotificationDispatcher for InAppNotifier {
    async fn notify(
        &self,
        holder: HolderId,
        message: &str,
        kind: NotificationKind,
        send_sms: bool,
    ) -> Result<()> {
        let recipient = self
            .store
            .holder(holder)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("Holder {holder} not found.")))?;

        let mut unit = self.store.begin(&[holder]).await?;
        unit.put_notification(Notification::unread(holder, message, kind))
            .await?;
        unit.commit().await?;

        if send_sms {
            let body = format!("{SMS_PREFIX}{message}");
            match self.sms.send(&international(&recipient.phone), &body).await {
                Ok(sid) => info!(%holder, %sid, "SMS sent"),
                Err(e) => warn!(%holder, error = %e, "SMS not delivered"),
            }
        }
        Ok(())
    }
}

/// Gateways expect a leading `+` on the number.
fn international(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

/// SMS gateway that only logs. Without a sender id it reports "not configured".
pub struct LogSmsGateway {
    sender: Option<String>,
}

impl LogSmsGateway {
    pub fn new(sender: Option<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, to_phone: &str, body: &str) -> std::result::Result<String, SmsError> {
        let Some(sender) = &self.sender else {
            warn!("SMS gateway is not configured. SMS not sent.");
            return Ok("not_configured".to_string());
        };
        info!(from = %sender, to = %to_phone, body, "SMS dispatched");
        Ok(uuid::Uuid::new_v4().to_string())
    }
}
