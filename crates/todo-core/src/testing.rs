//! In-memory wallet and chain used by the unit tests.
//!
//! `MockChain` decodes real calldata with the `ITodoList` bindings, keeps
//! todos per contract address, mines every transaction on submission and
//! delivers logs to live watchers. Individual steps can be scripted to fail.

use alloy_primitives::{address, Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

use crate::backend::{CallRequest, ContractBackend, EventLog, LogFilter, LogStream, WalletProvider};
use crate::binder::ContractBinder;
use crate::config::DappConfig;
use crate::context::DappContext;
use crate::contract::{InlineAbiSource, ITodoList};
use crate::error::{ProviderError, UNRECOGNIZED_CHAIN};
use crate::networks::{parse_chain_id, AddChainParams, NetworkRegistry, FUJI_CHAIN_ID, RTC_CHAIN_ID};
use crate::types::{TodoEvent, TxReceipt, WalletEvent};
use crate::validators::encode_content;

pub const ALICE: Address = address!("1111111111111111111111111111111111111111");
pub const BOB: Address = address!("2222222222222222222222222222222222222222");

/// Millisecond polls and a one second receipt timeout
pub fn fast_config() -> DappConfig {
    DappConfig {
        receipt_poll_interval_ms: 5,
        receipt_timeout_secs: 1,
        chain_settle_timeout_ms: 200,
        chain_settle_poll_ms: 5,
        event_poll_interval_ms: 10,
        ..DappConfig::default()
    }
}

// ============================================================================
// Wallet
// ============================================================================

struct WalletInner {
    accounts: Vec<Address>,
    authorized: bool,
    chain_id: u64,
    known_chains: HashSet<u64>,
    request_error: Option<ProviderError>,
    switch_error: Option<ProviderError>,
    add_error: Option<ProviderError>,
    switch_requests: Vec<String>,
    added: Vec<AddChainParams>,
    connected: bool,
}

pub struct MockWallet {
    inner: Mutex<WalletInner>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    /// Wallet on `chain_id` holding `accounts`, not yet authorized
    pub fn new(chain_id: u64, accounts: Vec<Address>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(WalletInner {
                accounts,
                authorized: false,
                chain_id,
                known_chains: HashSet::from([chain_id]),
                request_error: None,
                switch_error: None,
                add_error: None,
                switch_requests: Vec::new(),
                added: Vec::new(),
                connected: true,
            }),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WalletInner> {
        self.inner.lock().unwrap()
    }

    pub fn know_chain(&self, chain_id: u64) {
        self.lock().known_chains.insert(chain_id);
    }

    pub fn authorize(&self) {
        self.lock().authorized = true;
    }

    pub fn fail_request_accounts(&self, err: ProviderError) {
        self.lock().request_error = Some(err);
    }

    pub fn fail_switch(&self, err: ProviderError) {
        self.lock().switch_error = Some(err);
    }

    pub fn fail_add(&self, err: ProviderError) {
        self.lock().add_error = Some(err);
    }

    pub fn current_chain(&self) -> u64 {
        self.lock().chain_id
    }

    pub fn switch_requests(&self) -> Vec<String> {
        self.lock().switch_requests.clone()
    }

    pub fn added_chains(&self) -> Vec<AddChainParams> {
        self.lock().added.clone()
    }

    /// User picks other accounts in the wallet UI
    pub fn change_accounts(&self, accounts: Vec<Address>) {
        self.lock().accounts = accounts.clone();
        let _ = self.events.send(WalletEvent::AccountsChanged(accounts));
    }

    /// User switches chain from the wallet UI
    pub fn change_chain(&self, chain_id: u64) {
        {
            let mut inner = self.lock();
            inner.known_chains.insert(chain_id);
            inner.chain_id = chain_id;
        }
        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
    }

    fn move_to(&self, chain_id: u64) {
        let changed = {
            let mut inner = self.lock();
            let changed = inner.chain_id != chain_id;
            inner.chain_id = chain_id;
            changed
        };
        if changed {
            let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let mut inner = self.lock();
        if let Some(err) = inner.request_error.clone() {
            return Err(err);
        }
        inner.authorized = true;
        Ok(inner.accounts.clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let inner = self.lock();
        Ok(if inner.authorized { inner.accounts.clone() } else { Vec::new() })
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.lock().chain_id)
    }

    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError> {
        let target = {
            let mut inner = self.lock();
            inner.switch_requests.push(hex_chain_id.to_string());
            if let Some(err) = inner.switch_error.clone() {
                return Err(err);
            }
            let target = parse_chain_id(hex_chain_id)
                .ok_or_else(|| ProviderError::new(-32602, "invalid chain id"))?;
            if !inner.known_chains.contains(&target) {
                return Err(ProviderError::new(
                    UNRECOGNIZED_CHAIN,
                    format!("Unrecognized chain ID \"{}\"", hex_chain_id),
                ));
            }
            target
        };
        self.move_to(target);
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        let target = {
            let mut inner = self.lock();
            inner.added.push(params.clone());
            if let Some(err) = inner.add_error.clone() {
                return Err(err);
            }
            let target = parse_chain_id(&params.chain_id)
                .ok_or_else(|| ProviderError::new(-32602, "invalid chain id"))?;
            inner.known_chains.insert(target);
            target
        };
        // Adding a chain also switches to it
        self.move_to(target);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

// ============================================================================
// Chain
// ============================================================================

#[derive(Clone)]
struct StoredTodo {
    id: U256,
    content: B256,
    completed: bool,
    timestamp: U256,
    owner: Address,
}

impl StoredTodo {
    fn to_abi(&self) -> ITodoList::Todo {
        ITodoList::Todo {
            id: self.id,
            content: self.content,
            isCompleted: self.completed,
            timestamp: self.timestamp,
            owner: self.owner,
        }
    }
}

struct ChainInner {
    todos: HashMap<Address, Vec<StoredTodo>>,
    next_id: u64,
    tx_counter: u64,
    block: u64,
    receipts: HashMap<TxHash, TxReceipt>,
    receipt_polls: HashMap<TxHash, u32>,
    receipt_delay: u32,
    never_confirm: bool,
    revert_next: bool,
    gas_estimate: u64,
    estimate_error: Option<ProviderError>,
    send_error: Option<ProviderError>,
    watchers: Vec<(LogFilter, mpsc::UnboundedSender<EventLog>)>,
    sent: Vec<CallRequest>,
}

pub struct MockChain {
    inner: Mutex<ChainInner>,
    watch_calls: AtomicUsize,
    get_todos_calls: AtomicUsize,
    estimate_calls: AtomicUsize,
    /// Runs inside the next gas estimate, before it answers
    estimate_hook: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send>>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChainInner {
                todos: HashMap::new(),
                next_id: 0,
                tx_counter: 0,
                block: 1,
                receipts: HashMap::new(),
                receipt_polls: HashMap::new(),
                receipt_delay: 0,
                never_confirm: false,
                revert_next: false,
                gas_estimate: 50_000,
                estimate_error: None,
                send_error: None,
                watchers: Vec::new(),
                sent: Vec::new(),
            }),
            watch_calls: AtomicUsize::new(0),
            get_todos_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
            estimate_hook: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainInner> {
        self.inner.lock().unwrap()
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.lock().gas_estimate = gas;
    }

    pub fn fail_estimate(&self, err: ProviderError) {
        self.lock().estimate_error = Some(err);
    }

    /// Run `hook` while the next gas estimate is in flight
    pub fn during_next_estimate(&self, hook: impl Future<Output = ()> + Send + 'static) {
        *self.estimate_hook.lock().unwrap() = Some(Box::pin(hook));
    }

    pub fn fail_send(&self, err: ProviderError) {
        self.lock().send_error = Some(err);
    }

    /// Receipts stay unavailable for this many polls
    pub fn delay_receipts(&self, polls: u32) {
        self.lock().receipt_delay = polls;
    }

    pub fn never_confirm(&self) {
        self.lock().never_confirm = true;
    }

    /// Next transaction is mined with a failed status and no state change
    pub fn revert_next(&self) {
        self.lock().revert_next = true;
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn get_todos_calls(&self) -> usize {
        self.get_todos_calls.load(Ordering::SeqCst)
    }

    pub fn estimate_calls(&self) -> usize {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.lock().sent.clone()
    }

    /// Watchers whose stream is still held by a subscriber
    pub fn watcher_count(&self) -> usize {
        self.lock().watchers.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }

    /// Create a todo outside the client, as another tab would
    pub fn add_todo_directly(&self, contract: Address, owner: Address, content: &str) -> U256 {
        let word = encode_content(content).unwrap();
        let mut inner = self.lock();
        let id = Self::insert(&mut inner, contract, owner, word);
        let log = Self::log(
            contract,
            ITodoList::TodoCreated::SIGNATURE_HASH,
            owner,
            id,
            Bytes::from(word.0.to_vec()),
            None,
            inner.block,
        );
        Self::emit(&mut inner, log);
        id
    }

    fn insert(inner: &mut ChainInner, contract: Address, owner: Address, content: B256) -> U256 {
        let id = U256::from(inner.next_id);
        inner.next_id += 1;
        inner.todos.entry(contract).or_default().push(StoredTodo {
            id,
            content,
            completed: false,
            timestamp: U256::from(1_700_000_000u64 + inner.next_id),
            owner,
        });
        id
    }

    fn log(
        contract: Address,
        signature: B256,
        owner: Address,
        id: U256,
        data: Bytes,
        hash: Option<TxHash>,
        block: u64,
    ) -> EventLog {
        EventLog {
            address: contract,
            topics: vec![signature, owner.into_word(), B256::from(id.to_be_bytes::<32>())],
            data,
            block_number: Some(block),
            transaction_hash: hash,
        }
    }

    fn emit(inner: &mut ChainInner, log: EventLog) {
        inner.watchers.retain(|(_, tx)| !tx.is_closed());
        for (filter, tx) in &inner.watchers {
            if filter.matches(&log) {
                let _ = tx.send(log.clone());
            }
        }
    }

    /// Apply a state-changing call; `None` means the contract reverted
    fn execute(
        inner: &mut ChainInner,
        request: &CallRequest,
        hash: TxHash,
    ) -> Result<Option<EventLog>, ProviderError> {
        let from = request.from.unwrap_or(Address::ZERO);
        let contract = request.to;
        let data = &request.data[..];
        let block = inner.block;

        if let Ok(call) = ITodoList::addTodoCall::abi_decode(data) {
            let id = Self::insert(inner, contract, from, call.content);
            return Ok(Some(Self::log(
                contract,
                ITodoList::TodoCreated::SIGNATURE_HASH,
                from,
                id,
                Bytes::from(call.content.0.to_vec()),
                Some(hash),
                block,
            )));
        }

        if let Ok(call) = ITodoList::markTodoAsCompletedCall::abi_decode(data) {
            let todos = inner.todos.entry(contract).or_default();
            let Some(todo) = todos.iter_mut().find(|t| t.id == call.id && t.owner == from) else {
                return Ok(None);
            };
            if todo.completed {
                return Ok(None);
            }
            todo.completed = true;
            return Ok(Some(Self::log(
                contract,
                ITodoList::TodoCompleted::SIGNATURE_HASH,
                from,
                call.id,
                Bytes::new(),
                Some(hash),
                block,
            )));
        }

        if let Ok(call) = ITodoList::deleteTodoCall::abi_decode(data) {
            let todos = inner.todos.entry(contract).or_default();
            let before = todos.len();
            todos.retain(|t| !(t.id == call.id && t.owner == from));
            if todos.len() == before {
                return Ok(None);
            }
            return Ok(Some(Self::log(
                contract,
                ITodoList::TodoDeleted::SIGNATURE_HASH,
                from,
                call.id,
                Bytes::new(),
                Some(hash),
                block,
            )));
        }

        Err(ProviderError::new(-32000, "execution reverted: unknown selector"))
    }
}

#[async_trait]
impl ContractBackend for MockChain {
    async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
        if ITodoList::getTodosCall::abi_decode(&request.data).is_err() {
            return Err(ProviderError::new(-32000, "execution reverted"));
        }
        self.get_todos_calls.fetch_add(1, Ordering::SeqCst);

        let from = request.from.unwrap_or(Address::ZERO);
        let inner = self.lock();
        let todos: Vec<ITodoList::Todo> = inner
            .todos
            .get(&request.to)
            .map(|all| all.iter().filter(|t| t.owner == from).map(StoredTodo::to_abi).collect())
            .unwrap_or_default();
        Ok(Bytes::from(todos.abi_encode()))
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, ProviderError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        let hook = self.estimate_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        let inner = self.lock();
        match inner.estimate_error.clone() {
            Some(err) => Err(err),
            None => Ok(inner.gas_estimate),
        }
    }

    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, ProviderError> {
        let mut inner = self.lock();
        inner.sent.push(request.clone());
        if let Some(err) = inner.send_error.clone() {
            return Err(err);
        }

        inner.tx_counter += 1;
        inner.block += 1;
        let hash = B256::left_padding_from(&inner.tx_counter.to_be_bytes());

        let log = if std::mem::take(&mut inner.revert_next) {
            None
        } else {
            Self::execute(&mut inner, request, hash)?
        };
        let status = log.is_some();
        if let Some(log) = log {
            Self::emit(&mut inner, log);
        }

        if !inner.never_confirm {
            let receipt = TxReceipt {
                transaction_hash: hash,
                block_number: Some(inner.block),
                gas_used: request.gas.unwrap_or(inner.gas_estimate).min(inner.gas_estimate),
                status,
            };
            inner.receipts.insert(hash, receipt);
        }
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TxReceipt>, ProviderError> {
        let mut inner = self.lock();
        let delay = inner.receipt_delay;
        let polls = inner.receipt_polls.entry(hash).or_insert(0);
        *polls += 1;
        if *polls <= delay {
            return Ok(None);
        }
        Ok(inner.receipts.get(&hash).cloned())
    }

    async fn watch_logs(&self, filter: LogFilter) -> Result<LogStream, ProviderError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().watchers.push((filter, tx));
        Ok(rx)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub ctx: DappContext,
    pub events: mpsc::UnboundedReceiver<TodoEvent>,
    pub wallet: Arc<MockWallet>,
    pub chain: Arc<MockChain>,
    pub binder: Arc<ContractBinder>,
}

/// Wallet on Fuji (knows Fuji and RTC) holding ALICE and BOB, fast config
pub fn harness() -> Harness {
    let wallet = MockWallet::new(FUJI_CHAIN_ID, vec![ALICE, BOB]);
    wallet.know_chain(RTC_CHAIN_ID);
    harness_with(wallet, fast_config())
}

pub fn harness_with(wallet: MockWallet, config: DappConfig) -> Harness {
    let wallet = Arc::new(wallet);
    let chain = Arc::new(MockChain::new());
    let (ctx, events) = DappContext::new(
        wallet.clone(),
        chain.clone(),
        NetworkRegistry::builtin(),
        config,
    );
    let binder = Arc::new(ContractBinder::new(
        ctx.clone(),
        Arc::new(InlineAbiSource::bundled()),
    ));
    Harness { ctx, events, wallet, chain, binder }
}

impl Harness {
    /// ALICE connected on Fuji with the contract bound
    pub async fn connected(self) -> Self {
        self.wallet.authorize();
        {
            let mut session = self.ctx.session.write().await;
            session.set_account(Some(ALICE));
            session.set_chain(Some(FUJI_CHAIN_ID));
        }
        self.binder.bind(FUJI_CHAIN_ID).await.unwrap();
        self
    }

    pub fn fuji_contract(&self) -> Address {
        self.ctx.registry.lookup(FUJI_CHAIN_ID).unwrap().contract_address
    }
}
