//! ============================================================================
//! Chain Switcher - wallet switch / add-chain protocol
//! ============================================================================
//! 1. resolve the target in the network registry
//! 2. `wallet_switchEthereumChain`
//! 3. on "unrecognized chain" (4902) `wallet_addEthereumChain`
//! 4. wait until the wallet reports the target chain (bounded)
//! 5. record the chain in the session, rebind, refresh
//!
//! The wallet's own `chainChanged` notification races with step 4. Both
//! paths converge on `ContractBinder::ensure_bound`, which reuses a binding
//! already made for the same chain and account.
//! ============================================================================

use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::binder::ContractBinder;
use crate::context::DappContext;
use crate::error::DappError;
use crate::orchestrator::TodoOrchestrator;
use crate::types::BindingId;

pub struct ChainSwitcher {
    ctx: DappContext,
    binder: Arc<ContractBinder>,
    orchestrator: Arc<TodoOrchestrator>,
}

impl ChainSwitcher {
    pub fn new(
        ctx: DappContext,
        binder: Arc<ContractBinder>,
        orchestrator: Arc<TodoOrchestrator>,
    ) -> Self {
        Self {
            ctx,
            binder,
            orchestrator,
        }
    }

    pub async fn switch_to(&self, chain_id: u64) -> Result<BindingId, DappError> {
        let network = self
            .ctx
            .registry
            .lookup(chain_id)
            .ok_or(DappError::UnsupportedNetwork(chain_id))?
            .clone();

        info!("Switching wallet to {} ({})", network.name, network.hex_chain_id);
        match self.ctx.wallet.switch_chain(&network.hex_chain_id).await {
            Ok(()) => {}
            Err(e) if e.is_unrecognized_chain() => {
                info!("{} unknown to wallet, requesting add", network.name);
                self.ctx
                    .wallet
                    .add_chain(&network.add_chain_params)
                    .await
                    .map_err(DappError::AddFailed)?;
            }
            Err(e) => {
                warn!("Switch to {} rejected: {}", network.name, e);
                return Err(DappError::SwitchRejected(e));
            }
        }

        self.await_chain(chain_id).await;

        {
            let mut session = self.ctx.session.write().await;
            session.set_chain(Some(chain_id));
        }
        self.ctx.ui.write().await.set_network(network.name.clone());

        let binding = self.binder.ensure_bound(chain_id).await?;

        if self.ctx.session.read().await.account().is_some() {
            if let Err(e) = self.orchestrator.refresh().await {
                warn!("Refresh after switching to {} failed: {}", network.name, e);
            }
        }
        Ok(binding)
    }

    /// Poll the wallet until it reports `chain_id` or the settle timeout passes
    async fn await_chain(&self, chain_id: u64) -> bool {
        let deadline = Instant::now() + self.ctx.config.chain_settle_timeout();
        loop {
            match self.ctx.wallet.chain_id().await {
                Ok(current) if current == chain_id => {
                    debug!("Wallet settled on chain {}", chain_id);
                    return true;
                }
                Ok(current) => debug!("Wallet still on chain {}", current),
                Err(e) => debug!("Chain id query failed while settling: {}", e),
            }
            if Instant::now() >= deadline {
                warn!(
                    "Wallet did not report chain {} within {:?}",
                    chain_id,
                    self.ctx.config.chain_settle_timeout()
                );
                return false;
            }
            sleep(self.ctx.config.chain_settle_poll()).await;
        }
    }
}
