use crate::domain::audit::AuditEvent;
use crate::domain::ports::AuditSink;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

/// Emits audit events on the `audit` tracing target.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        info!(
            target: "audit",
            action = %event.action,
            holder = ?event.holder,
            details = %event.details,
            "audit"
        );
        Ok(())
    }
}

/// Keeps audit events in memory, in arrival order.
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn actions(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
