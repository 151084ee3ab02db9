//! ============================================================================
//! Contract Binder - resolve, load ABI, subscribe, install
//! ============================================================================
//! Binding steps for a chain id:
//! 1. resolve the deployment in the network registry
//! 2. load and verify the ABI resource
//! 3. drop the previous binding, unless the session moved to another chain
//! 4. subscribe to TodoCreated / TodoCompleted / TodoDeleted for the account
//! 5. install into the session if the chain is still current
//!
//! Installation through the session is the only path that creates
//! subscriptions, so a superseded binding can never keep delivering events.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::contract::{decode_event, verify_abi, AbiSource, BoundContract, Subscription};
use crate::context::DappContext;
use crate::error::DappError;
use crate::types::{BindingId, TodoEventKind};

pub struct ContractBinder {
    ctx: DappContext,
    abi_source: Arc<dyn AbiSource>,
}

impl ContractBinder {
    pub fn new(ctx: DappContext, abi_source: Arc<dyn AbiSource>) -> Self {
        Self { ctx, abi_source }
    }

    /// Bind the TodoList deployment of `chain_id` and install it in the session
    pub async fn bind(&self, chain_id: u64) -> Result<BindingId, DappError> {
        let network = self
            .ctx
            .registry
            .lookup(chain_id)
            .ok_or(DappError::UnsupportedNetwork(chain_id))?
            .clone();

        let abi = self.abi_source.load().await?;
        verify_abi(&abi)?;

        // Tear down before building the replacement, unless the session moved on
        let owner = {
            let mut session = self.ctx.session.write().await;
            if session.chain_id() != Some(chain_id) {
                debug!(
                    "Skipping bind for chain {} (session chain {:?})",
                    chain_id,
                    session.chain_id()
                );
                return Err(DappError::StaleBinding);
            }
            session.drop_contract();
            session.account()
        };

        let mut contract = BoundContract::new(chain_id, network.contract_address, owner, abi);
        debug!(
            "Binding {} for {} at {} (owner filter {:?})",
            contract.id(),
            network.name,
            network.contract_address,
            owner
        );

        for kind in TodoEventKind::ALL {
            let subscription = self.subscribe(&contract, kind).await?;
            contract.install(subscription);
        }

        let mut session = self.ctx.session.write().await;
        if session.account() != owner {
            // Account switched while subscribing; the filter is stale
            contract.teardown();
            return Err(DappError::StaleBinding);
        }
        let id = session.set_contract(contract, &self.ctx.registry)?;
        info!("Contract bound on {} ({})", network.name, id);
        Ok(id)
    }

    /// Bind unless the session already holds a binding for this chain and account
    ///
    /// Safe to call from both the chain switcher and the `chainChanged`
    /// handler, in either order.
    pub async fn ensure_bound(&self, chain_id: u64) -> Result<BindingId, DappError> {
        {
            let session = self.ctx.session.read().await;
            if let Some(contract) = session.contract() {
                if contract.chain_id() == chain_id && contract.owner() == session.account() {
                    debug!("Reusing {} for chain {}", contract.id(), chain_id);
                    return Ok(contract.id());
                }
            }
        }
        self.bind(chain_id).await
    }

    async fn subscribe(
        &self,
        contract: &BoundContract,
        kind: TodoEventKind,
    ) -> Result<Subscription, DappError> {
        let mut stream = self
            .ctx
            .backend
            .watch_logs(contract.log_filter(kind))
            .await?;

        let binding = contract.id();
        let sink = self.ctx.events.clone();

        let task = tokio::spawn(async move {
            while let Some(log) = stream.recv().await {
                match decode_event(binding, &log) {
                    Some(event) => {
                        debug!("{} delivered {:?} for todo {}", binding, event.kind, event.id);
                        if sink.send(event).is_err() {
                            break;
                        }
                    }
                    None => warn!("Undecodable {} log on {}", kind.event_name(), binding),
                }
            }
        });

        Ok(Subscription::new(kind, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::InlineAbiSource;
    use crate::networks::{FUJI_CHAIN_ID, RTC_CHAIN_ID};
    use crate::testing::{harness, ALICE};
    use std::time::Duration;

    #[tokio::test]
    async fn test_unsupported_network() {
        let h = harness();
        h.ctx.session.write().await.set_chain(Some(1));
        assert_eq!(h.binder.bind(1).await, Err(DappError::UnsupportedNetwork(1)));
        assert!(h.ctx.session.read().await.contract().is_none());
        assert_eq!(h.chain.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_abi_load_error() {
        let h = harness();
        h.ctx.session.write().await.set_chain(Some(FUJI_CHAIN_ID));
        let binder = ContractBinder::new(h.ctx.clone(), Arc::new(InlineAbiSource::new("not json")));
        assert!(matches!(binder.bind(FUJI_CHAIN_ID).await, Err(DappError::AbiLoad(_))));
        assert!(h.ctx.session.read().await.contract().is_none());
    }

    #[tokio::test]
    async fn test_bind_installs_three_subscriptions() {
        let h = harness();
        {
            let mut session = h.ctx.session.write().await;
            session.set_account(Some(ALICE));
            session.set_chain(Some(FUJI_CHAIN_ID));
        }

        let id = h.binder.bind(FUJI_CHAIN_ID).await.unwrap();
        let session = h.ctx.session.read().await;
        let contract = session.contract().unwrap();
        assert_eq!(contract.id(), id);
        assert_eq!(contract.subscription_count(), 3);
        assert_eq!(contract.owner(), Some(ALICE));
        assert_eq!(
            contract.address(),
            h.ctx.registry.lookup(FUJI_CHAIN_ID).unwrap().contract_address
        );
    }

    #[tokio::test]
    async fn test_rebind_does_not_duplicate_events() {
        let mut h = harness();
        {
            let mut session = h.ctx.session.write().await;
            session.set_account(Some(ALICE));
            session.set_chain(Some(FUJI_CHAIN_ID));
        }
        let first = h.binder.bind(FUJI_CHAIN_ID).await.unwrap();
        let second = h.binder.bind(FUJI_CHAIN_ID).await.unwrap();
        assert_ne!(first, second);

        let fuji = h.ctx.registry.lookup(FUJI_CHAIN_ID).unwrap().contract_address;
        h.chain.add_todo_directly(fuji, ALICE, "Buy milk");

        let event = tokio::time::timeout(Duration::from_secs(1), h.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.binding, second);
        assert_eq!(event.kind, TodoEventKind::Created);

        // No second copy from the superseded binding
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ensure_bound_is_idempotent() {
        let h = harness();
        {
            let mut session = h.ctx.session.write().await;
            session.set_account(Some(ALICE));
            session.set_chain(Some(RTC_CHAIN_ID));
        }
        let first = h.binder.ensure_bound(RTC_CHAIN_ID).await.unwrap();
        let again = h.binder.ensure_bound(RTC_CHAIN_ID).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(h.chain.watch_calls(), 3);
    }

    #[tokio::test]
    async fn test_bind_for_superseded_chain_is_stale() {
        let h = harness();
        // Session already moved to RTC; a late bind for Fuji must not install
        h.ctx.session.write().await.set_chain(Some(RTC_CHAIN_ID));
        assert_eq!(h.binder.bind(FUJI_CHAIN_ID).await, Err(DappError::StaleBinding));
        assert!(h.ctx.session.read().await.contract().is_none());
        assert_eq!(h.chain.watch_calls(), 0);
    }

    #[tokio::test]
    async fn test_late_bind_keeps_current_binding() {
        let h = harness().connected().await;
        h.ctx.session.write().await.set_chain(Some(RTC_CHAIN_ID));
        let current = h.binder.bind(RTC_CHAIN_ID).await.unwrap();
        let watches = h.chain.watch_calls();

        assert_eq!(h.binder.bind(FUJI_CHAIN_ID).await, Err(DappError::StaleBinding));

        let session = h.ctx.session.read().await;
        assert_eq!(session.binding(), Some(current));
        let contract = session.contract().unwrap();
        assert_eq!(contract.chain_id(), RTC_CHAIN_ID);
        assert_eq!(contract.subscription_count(), 3);
        assert_eq!(contract.active_subscriptions(), 3);
        assert_eq!(h.chain.watch_calls(), watches);
    }
}
