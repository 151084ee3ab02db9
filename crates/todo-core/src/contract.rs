//! ============================================================================
//! TodoList Contract - ABI bindings, bound handle and event subscriptions
//! ============================================================================
//! - `ITodoList` bindings generated by `sol!` for calldata and events
//! - ABI resource loading (file or http) and interface verification
//! - `BoundContract`: (ABI, address, live subscriptions) for one chain
//! ============================================================================

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::{CallRequest, EventLog, LogFilter};
use crate::error::DappError;
use crate::types::{BindingId, Todo, TodoEvent, TodoEventKind};
use crate::validators::decode_content;

sol! {
    interface ITodoList {
        #[derive(Debug, PartialEq)]
        struct Todo {
            uint256 id;
            bytes32 content;
            bool isCompleted;
            uint256 timestamp;
            address owner;
        }

        function getTodos() external view returns (Todo[] memory);
        function addTodo(bytes32 content) external;
        function markTodoAsCompleted(uint256 id) external;
        function deleteTodo(uint256 id) external;

        event TodoCreated(address indexed owner, uint256 indexed id, bytes32 content);
        event TodoCompleted(address indexed owner, uint256 indexed id);
        event TodoDeleted(address indexed owner, uint256 indexed id);
    }
}

/// ABI shipped with the client, same content as `abis/TodoList.json`
pub const TODO_LIST_ABI_JSON: &str = include_str!("../../../abis/TodoList.json");

const REQUIRED_FUNCTIONS: [&str; 4] = ["getTodos", "addTodo", "markTodoAsCompleted", "deleteTodo"];

impl From<ITodoList::Todo> for Todo {
    fn from(raw: ITodoList::Todo) -> Self {
        Self {
            id: raw.id,
            content: decode_content(&raw.content),
            content_bytes: raw.content,
            is_completed: raw.isCompleted,
            timestamp: u64::try_from(raw.timestamp).unwrap_or(u64::MAX),
            owner: raw.owner,
        }
    }
}

/// topic0 of each domain event
pub fn event_signature(kind: TodoEventKind) -> B256 {
    match kind {
        TodoEventKind::Created => ITodoList::TodoCreated::SIGNATURE_HASH,
        TodoEventKind::Completed => ITodoList::TodoCompleted::SIGNATURE_HASH,
        TodoEventKind::Deleted => ITodoList::TodoDeleted::SIGNATURE_HASH,
    }
}

/// Decode the indexed fields of a TodoList log
///
/// All three events index `(owner, id)`, so topics alone are enough.
pub fn decode_event(binding: BindingId, log: &EventLog) -> Option<TodoEvent> {
    let signature = log.topics.first()?;
    let kind = TodoEventKind::ALL
        .into_iter()
        .find(|k| event_signature(*k) == *signature)?;
    let owner = Address::from_word(*log.topics.get(1)?);
    let id = U256::from_be_bytes(log.topics.get(2)?.0);

    Some(TodoEvent {
        kind,
        owner,
        id,
        binding,
        transaction_hash: log.transaction_hash,
    })
}

// ============================================================================
// ABI resource
// ============================================================================

/// Where the contract's ABI description comes from
#[async_trait]
pub trait AbiSource: Send + Sync {
    async fn load(&self) -> Result<JsonAbi, DappError>;
}

/// Accepts a bare ABI array or a build artifact with an `abi` field
pub fn parse_abi(json: &str) -> Result<JsonAbi, DappError> {
    #[derive(Deserialize)]
    struct Artifact {
        abi: JsonAbi,
    }

    serde_json::from_str::<JsonAbi>(json)
        .or_else(|_| serde_json::from_str::<Artifact>(json).map(|a| a.abi))
        .map_err(|e| DappError::AbiLoad(format!("invalid ABI JSON: {}", e)))
}

/// Ensure the ABI declares every call and event the client relies on
pub fn verify_abi(abi: &JsonAbi) -> Result<(), DappError> {
    for name in REQUIRED_FUNCTIONS {
        if !abi.functions.contains_key(name) {
            return Err(DappError::AbiLoad(format!("ABI is missing function '{}'", name)));
        }
    }
    for kind in TodoEventKind::ALL {
        if !abi.events.contains_key(kind.event_name()) {
            return Err(DappError::AbiLoad(format!(
                "ABI is missing event '{}'",
                kind.event_name()
            )));
        }
    }
    Ok(())
}

pub struct FileAbiSource {
    path: PathBuf,
}

impl FileAbiSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AbiSource for FileAbiSource {
    async fn load(&self) -> Result<JsonAbi, DappError> {
        debug!("Loading ABI from {}", self.path.display());
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DappError::AbiLoad(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        parse_abi(&json)
    }
}

pub struct HttpAbiSource {
    client: reqwest::Client,
    url: String,
}

impl HttpAbiSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AbiSource for HttpAbiSource {
    async fn load(&self) -> Result<JsonAbi, DappError> {
        debug!("Fetching ABI from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DappError::AbiLoad(format!("failed to fetch {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(DappError::AbiLoad(format!(
                "failed to fetch {}: HTTP {}",
                self.url,
                response.status()
            )));
        }

        let json = response
            .text()
            .await
            .map_err(|e| DappError::AbiLoad(format!("failed to read {}: {}", self.url, e)))?;
        parse_abi(&json)
    }
}

/// ABI held in memory
pub struct InlineAbiSource {
    json: String,
}

impl InlineAbiSource {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    /// The ABI shipped with the client
    pub fn bundled() -> Self {
        Self::new(TODO_LIST_ABI_JSON)
    }
}

#[async_trait]
impl AbiSource for InlineAbiSource {
    async fn load(&self) -> Result<JsonAbi, DappError> {
        parse_abi(&self.json)
    }
}

/// Pick a source from a config location: http(s) URLs are fetched, anything else is a path
pub fn abi_source_for(location: &str) -> Arc<dyn AbiSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpAbiSource::new(location))
    } else {
        Arc::new(FileAbiSource::new(location))
    }
}

// ============================================================================
// Bound contract
// ============================================================================

/// A live event subscription; aborted on cancel or drop
#[derive(Debug)]
pub struct Subscription {
    kind: TodoEventKind,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(kind: TodoEventKind, task: JoinHandle<()>) -> Self {
        Self { kind, task }
    }

    pub fn kind(&self) -> TodoEventKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// TodoList contract bound to one chain's deployment
///
/// Never mutated in place after installation: a chain or account change
/// produces a new `BoundContract` with a new [`BindingId`].
#[derive(Debug)]
pub struct BoundContract {
    id: BindingId,
    chain_id: u64,
    address: Address,
    /// Account the event subscriptions are filtered on
    owner: Option<Address>,
    abi: Arc<JsonAbi>,
    subscriptions: Vec<Subscription>,
}

impl BoundContract {
    pub fn new(chain_id: u64, address: Address, owner: Option<Address>, abi: JsonAbi) -> Self {
        Self {
            id: BindingId::next(),
            chain_id,
            address,
            owner,
            abi: Arc::new(abi),
            subscriptions: Vec::new(),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Filter for one event kind on this deployment
    pub fn log_filter(&self, kind: TodoEventKind) -> LogFilter {
        LogFilter {
            address: self.address,
            event_signature: event_signature(kind),
            owner: self.owner,
        }
    }

    pub(crate) fn install(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    /// Cancel every subscription; the handle is unusable for events afterwards
    pub fn teardown(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        debug!(
            "Tearing down {} subscriptions for {} on chain {}",
            self.subscriptions.len(),
            self.id,
            self.chain_id
        );
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    pub fn get_todos(&self, account: Address) -> CallRequest {
        CallRequest::new(account, self.address, ITodoList::getTodosCall {}.abi_encode())
    }

    pub fn add_todo(&self, account: Address, content: B256) -> CallRequest {
        CallRequest::new(account, self.address, ITodoList::addTodoCall { content }.abi_encode())
    }

    pub fn mark_completed(&self, account: Address, id: U256) -> CallRequest {
        CallRequest::new(
            account,
            self.address,
            ITodoList::markTodoAsCompletedCall { id }.abi_encode(),
        )
    }

    pub fn delete_todo(&self, account: Address, id: U256) -> CallRequest {
        CallRequest::new(account, self.address, ITodoList::deleteTodoCall { id }.abi_encode())
    }

    /// Decode `getTodos()` return data
    pub fn decode_todos(data: &[u8]) -> Result<Vec<Todo>, DappError> {
        let raw = Vec::<ITodoList::Todo>::abi_decode(data)
            .map_err(|e| DappError::Decode(e.to_string()))?;
        Ok(raw.into_iter().map(Todo::from).collect())
    }
}
