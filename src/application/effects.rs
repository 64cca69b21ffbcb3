use crate::domain::audit::AuditEvent;
use crate::domain::notification::Notice;
use crate::domain::ports::{AuditSink, NotificationDispatcher};
use std::sync::Arc;
use tracing::warn;

/// Non-financial work collected while a unit of work runs.
///
/// Nothing here is dispatched until the unit has committed.
#[derive(Debug, Default)]
pub struct SideEffects {
    pub notices: Vec<Notice>,
    pub audit: Vec<AuditEvent>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, notice: Notice) -> &mut Self {
        self.notices.push(notice);
        self
    }

    pub fn audit(&mut self, event: AuditEvent) -> &mut Self {
        self.audit.push(event);
        self
    }
}

/// Dispatches side effects after commit. Failures are logged, never returned.
#[derive(Clone)]
pub struct EffectDispatcher {
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
}

impl EffectDispatcher {
    pub fn new(notifier: Arc<dyn NotificationDispatcher>, audit: Arc<dyn AuditSink>) -> Self {
        Self { notifier, audit }
    }

    pub async fn dispatch(&self, effects: SideEffects) {
        for notice in effects.notices {
            if let Err(e) = self
                .notifier
                .notify(notice.holder, &notice.message, notice.kind, notice.send_sms)
                .await
            {
                warn!(holder = %notice.holder, kind = ?notice.kind, error = %e, "notification failed");
            }
        }
        for event in effects.audit {
            let action = event.action.clone();
            if let Err(e) = self.audit.record(event).await {
                warn!(%action, error = %e, "audit record failed");
            }
        }
    }
}
