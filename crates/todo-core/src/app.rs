//! ============================================================================
//! Todo DApp - application controller
//! ============================================================================
//! Owns the context and every component, exposes the user actions and
//! runs the single event loop:
//!
//!   wallet notifications ──┐
//!                          ├─> select! ─> session / binder / orchestrator
//!   contract events ───────┘
//!
//! User actions wrap the component call with a loading label and turn
//! failures into translated error toasts. The components themselves never
//! touch toasts except for success announcements and gas warnings.
//! ============================================================================

use alloy_primitives::{Address, U256};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::backend::{ContractBackend, WalletProvider};
use crate::binder::ContractBinder;
use crate::config::DappConfig;
use crate::context::DappContext;
use crate::contract::AbiSource;
use crate::error::DappError;
use crate::error_translator::describe;
use crate::networks::NetworkRegistry;
use crate::orchestrator::TodoOrchestrator;
use crate::reconciler::EventReconciler;
use crate::session::SessionSnapshot;
use crate::switcher::ChainSwitcher;
use crate::types::{StatusMessage, Todo, TodoEvent, TxReceipt, WalletEvent};
use crate::ui::{UiState, NOT_CONNECTED, UNSUPPORTED_NETWORK};

pub const LOADING_CONNECT: &str = "Connecting wallet...";
pub const LOADING_SWITCH: &str = "Switching Network...";
pub const LOADING_CREATE: &str = "Creating todo...";

pub struct TodoDapp {
    ctx: DappContext,
    binder: Arc<ContractBinder>,
    orchestrator: Arc<TodoOrchestrator>,
    switcher: ChainSwitcher,
    reconciler: EventReconciler,
}

impl TodoDapp {
    /// Wire the components; the receiver feeds [`TodoDapp::run`]
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        backend: Arc<dyn ContractBackend>,
        registry: NetworkRegistry,
        config: DappConfig,
        abi_source: Arc<dyn AbiSource>,
    ) -> (Self, mpsc::UnboundedReceiver<TodoEvent>) {
        let (ctx, events) = DappContext::new(wallet, backend, registry, config);
        let binder = Arc::new(ContractBinder::new(ctx.clone(), abi_source));
        let orchestrator = Arc::new(TodoOrchestrator::new(ctx.clone()));
        let switcher = ChainSwitcher::new(ctx.clone(), binder.clone(), orchestrator.clone());
        let reconciler = EventReconciler::new(ctx.clone(), orchestrator.clone());

        let app = Self {
            ctx,
            binder,
            orchestrator,
            switcher,
            reconciler,
        };
        (app, events)
    }

    pub fn context(&self) -> &DappContext {
        &self.ctx
    }

    pub async fn ui_snapshot(&self) -> UiState {
        self.ctx.ui.read().await.clone()
    }

    pub async fn session_snapshot(&self) -> SessionSnapshot {
        self.ctx.session.read().await.snapshot()
    }

    /// Adopt the wallet's current chain and any already-authorized account
    pub async fn init(&self) -> Result<SessionSnapshot, DappError> {
        let result = self.sync_with_wallet().await;
        if let Err(e) = &result {
            self.report("Failed to initialize app", e).await;
        }
        result
    }

    async fn sync_with_wallet(&self) -> Result<SessionSnapshot, DappError> {
        let chain_id = self.ctx.wallet.chain_id().await?;
        match self.handle_chain_change(chain_id).await {
            Ok(()) => {}
            Err(DappError::UnsupportedNetwork(id)) => {
                warn!("Wallet is on unsupported chain {}", id);
            }
            Err(e) => return Err(e),
        }

        let accounts = self.ctx.wallet.accounts().await?;
        if !accounts.is_empty() {
            self.handle_account_change(accounts).await?;
        }

        let snapshot = self.session_snapshot().await;
        info!(
            "Initialized: account {:?}, chain {:?}, {:?}",
            snapshot.account, snapshot.chain_id, snapshot.binding
        );
        Ok(snapshot)
    }

    pub async fn connect_wallet(&self) -> Result<Address, DappError> {
        let result = self
            .with_loading(Some(LOADING_CONNECT), "Failed to connect wallet", async {
                let accounts = self.ctx.wallet.request_accounts().await?;
                let account = *accounts.first().ok_or(DappError::WalletNotConnected)?;
                self.handle_account_change(accounts).await?;
                Ok::<_, DappError>(account)
            })
            .await;

        if result.is_ok() {
            self.ctx
                .notify(StatusMessage::success("Wallet connected successfully"))
                .await;
        }
        result
    }

    /// Forget the session locally; the wallet keeps its authorization
    pub async fn disconnect(&self) {
        self.ctx.session.write().await.clear();
        {
            let mut ui = self.ctx.ui.write().await;
            ui.set_account(None);
            ui.set_network(NOT_CONNECTED);
            ui.clear_todos();
        }
        info!("Wallet disconnected");
        self.ctx
            .notify(StatusMessage::success("Wallet disconnected successfully!"))
            .await;
    }

    /// `accountsChanged`: first account becomes current, empty means locked
    pub async fn handle_account_change(&self, accounts: Vec<Address>) -> Result<(), DappError> {
        let account = accounts.first().copied();
        let chain_id = {
            let mut session = self.ctx.session.write().await;
            session.set_account(account);
            if account.is_none() {
                session.drop_contract();
            }
            session.chain_id()
        };
        self.ctx.ui.write().await.set_account(account);

        if account.is_none() {
            self.ctx.ui.write().await.clear_todos();
            info!("No account available, session cleared");
            return Ok(());
        }

        match chain_id {
            Some(chain_id) if self.ctx.registry.is_supported(chain_id) => {
                // Subscriptions filter on the account, so this rebinds
                self.binder.ensure_bound(chain_id).await?;
                self.orchestrator.refresh().await?;
            }
            _ => debug!("Account set without a supported chain"),
        }
        Ok(())
    }

    /// `chainChanged`: rebind on supported chains, tear down otherwise
    pub async fn handle_chain_change(&self, chain_id: u64) -> Result<(), DappError> {
        let account = {
            let mut session = self.ctx.session.write().await;
            session.set_chain(Some(chain_id));
            session.account()
        };

        let Some(network) = self.ctx.registry.lookup(chain_id) else {
            let mut ui = self.ctx.ui.write().await;
            ui.set_network(UNSUPPORTED_NETWORK);
            ui.clear_todos();
            return Err(DappError::UnsupportedNetwork(chain_id));
        };

        self.ctx.ui.write().await.set_network(network.name.clone());
        self.binder.ensure_bound(chain_id).await?;
        if account.is_some() {
            self.orchestrator.refresh().await?;
        }
        Ok(())
    }

    pub async fn switch_network(&self, chain_id: u64) -> Result<(), DappError> {
        self.with_loading(
            Some(LOADING_SWITCH),
            "Failed to switch network",
            self.switcher.switch_to(chain_id),
        )
        .await?;

        if let Some(network) = self.ctx.registry.lookup(chain_id) {
            self.ctx
                .notify(StatusMessage::success(format!(
                    "Successfully switched to {}",
                    network.name
                )))
                .await;
        }
        Ok(())
    }

    pub async fn create_todo(&self, content: &str) -> Result<TxReceipt, DappError> {
        self.with_loading(
            Some(LOADING_CREATE),
            "Failed to create todo",
            self.orchestrator.create(content),
        )
        .await
    }

    pub async fn complete_todo(&self, id: U256) -> Result<TxReceipt, DappError> {
        self.with_loading(None, "Failed to complete todo", self.orchestrator.complete(id))
            .await
    }

    pub async fn delete_todo(&self, id: U256) -> Result<TxReceipt, DappError> {
        self.with_loading(None, "Failed to delete todo", self.orchestrator.delete(id))
            .await
    }

    pub async fn refresh(&self) -> Result<Vec<Todo>, DappError> {
        let result = self.orchestrator.refresh().await;
        if let Err(e) = &result {
            self.report("Failed to load todos", e).await;
        }
        result
    }

    /// Multiplex wallet notifications and contract events until `shutdown`
    pub async fn run<F>(&self, mut events: mpsc::UnboundedReceiver<TodoEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut wallet_events = self.ctx.wallet.subscribe();
        let mut wallet_open = true;
        tokio::pin!(shutdown);
        info!("Event loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                notification = wallet_events.recv(), if wallet_open => match notification {
                    Ok(event) => self.handle_wallet_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} wallet notifications, resyncing", missed);
                        if let Err(e) = self.init().await {
                            debug!("Resync after missed notifications failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Wallet notification channel closed");
                        wallet_open = false;
                    }
                },
                Some(event) = events.recv() => {
                    if let Err(e) = self.reconciler.handle(event).await {
                        self.report("Failed to load todos", &e).await;
                    }
                }
            }
        }

        self.ctx.session.write().await.drop_contract();
        info!("Event loop stopped");
    }

    async fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                if let Err(e) = self.handle_account_change(accounts).await {
                    self.report("Failed to handle account change", &e).await;
                }
            }
            WalletEvent::ChainChanged(chain_id) => match self.handle_chain_change(chain_id).await {
                Ok(()) => {}
                Err(e @ DappError::UnsupportedNetwork(_)) => {
                    self.ctx.notify(StatusMessage::error(describe(&e))).await;
                }
                Err(e) => self.report("Failed to initialize contract", &e).await,
            },
        }
    }

    async fn with_loading<T, Fut>(
        &self,
        label: Option<&str>,
        failure: &str,
        op: Fut,
    ) -> Result<T, DappError>
    where
        Fut: Future<Output = Result<T, DappError>>,
    {
        self.ctx.ui.write().await.show_loading(label);
        let result = op.await;
        self.ctx.ui.write().await.hide_loading();

        if let Err(e) = &result {
            self.report(failure, e).await;
        }
        result
    }

    async fn report(&self, context: &str, err: &DappError) {
        if matches!(err, DappError::StaleBinding) {
            debug!("{}: result superseded", context);
            return;
        }
        error!("{}: {}", context, err);
        self.ctx
            .notify(StatusMessage::error(format!("{}: {}", context, describe(err))))
            .await;
    }
}
