//! Shared handles passed to every component.

use alloy_primitives::B256;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::backend::{ContractBackend, WalletProvider};
use crate::config::DappConfig;
use crate::networks::NetworkRegistry;
use crate::session::SessionState;
use crate::types::{StatusMessage, TodoEvent, TodoEventKind};
use crate::ui::UiState;

/// How many announced changes are remembered for de-duplication
const ANNOUNCE_WINDOW: usize = 256;

type AnnounceKey = (TodoEventKind, B256);

/// Recently announced keys, oldest evicted first
#[derive(Default)]
struct Announced {
    order: VecDeque<AnnounceKey>,
    seen: HashSet<AnnounceKey>,
}

impl Announced {
    fn insert(&mut self, key: AnnounceKey) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > ANNOUNCE_WINDOW {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

/// Everything a component needs; cheap to clone
///
/// The session is the only shared mutable state. Components never cache
/// account, chain or binding across an await; they re-read it here.
#[derive(Clone)]
pub struct DappContext {
    pub wallet: Arc<dyn WalletProvider>,
    pub backend: Arc<dyn ContractBackend>,
    pub registry: Arc<NetworkRegistry>,
    pub config: Arc<DappConfig>,
    pub session: Arc<RwLock<SessionState>>,
    pub ui: Arc<RwLock<UiState>>,
    /// Sink for decoded contract events, drained by the event loop
    pub events: mpsc::UnboundedSender<TodoEvent>,
    /// Success toasts already shown, keyed by (event kind, tx hash or todo id)
    announced: Arc<Mutex<Announced>>,
}

impl DappContext {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        backend: Arc<dyn ContractBackend>,
        registry: NetworkRegistry,
        config: DappConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TodoEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let ui = UiState::new(config.toast_capacity);
        let ctx = Self {
            wallet,
            backend,
            registry: Arc::new(registry),
            config: Arc::new(config),
            session: Arc::new(RwLock::new(SessionState::new())),
            ui: Arc::new(RwLock::new(ui)),
            events,
            announced: Arc::new(Mutex::new(Announced::default())),
        };
        (ctx, events_rx)
    }

    pub async fn notify(&self, message: StatusMessage) {
        self.ui.write().await.push_status(message);
    }

    /// Push the success toast for `kind` once per key
    ///
    /// A confirmed receipt and the matching contract event both report the
    /// same change; whichever arrives first shows the toast. Returns false
    /// when the key was already announced. Only the most recent keys are
    /// remembered.
    pub async fn announce(&self, kind: TodoEventKind, key: B256) -> bool {
        if !self.announced.lock().await.insert((kind, key)) {
            debug!("{} for {} already announced", kind.event_name(), key);
            return false;
        }
        self.notify(StatusMessage::success(kind.success_message())).await;
        true
    }
}
