//! Contract event reconciliation.
//!
//! A domain event never patches the cached list; it triggers a full re-read,
//! so duplicated or reordered deliveries converge on the same snapshot.

use alloy_primitives::B256;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::DappContext;
use crate::error::DappError;
use crate::orchestrator::TodoOrchestrator;
use crate::types::TodoEvent;

pub struct EventReconciler {
    ctx: DappContext,
    orchestrator: Arc<TodoOrchestrator>,
}

impl EventReconciler {
    pub fn new(ctx: DappContext, orchestrator: Arc<TodoOrchestrator>) -> Self {
        Self { ctx, orchestrator }
    }

    /// Apply one event; returns false when it belongs to a superseded
    /// binding or to another account
    pub async fn handle(&self, event: TodoEvent) -> Result<bool, DappError> {
        {
            let session = self.ctx.session.read().await;
            if session.binding() != Some(event.binding) {
                debug!(
                    "Dropping {} from {} (current {:?})",
                    event.kind.event_name(),
                    event.binding,
                    session.binding()
                );
                return Ok(false);
            }
            if session.account().is_some_and(|account| account != event.owner) {
                debug!("Dropping {} for {}", event.kind.event_name(), event.owner);
                return Ok(false);
            }
        }

        info!("{} for todo {}", event.kind.event_name(), event.id);
        self.orchestrator.refresh().await?;

        let key = event
            .transaction_hash
            .unwrap_or_else(|| B256::from(event.id.to_be_bytes::<32>()));
        self.ctx.announce(event.kind, key).await;
        Ok(true)
    }
}
