//! ============================================================================
//! JSON-RPC Client - wallet + contract backend over HTTP
//! ============================================================================
//! Talks to a node that manages unlocked accounts (anvil, hardhat, geth
//! --dev) or to a wallet bridge exposing the same methods:
//! - eth_requestAccounts / eth_accounts / eth_chainId
//! - wallet_switchEthereumChain / wallet_addEthereumChain
//! - eth_call / eth_estimateGas / eth_sendTransaction
//! - eth_getTransactionReceipt / eth_blockNumber / eth_getLogs
//!
//! HTTP has no push channel, so wallet notifications and contract logs are
//! produced by polling tasks.
//! ============================================================================

use alloy_primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{CallRequest, ContractBackend, EventLog, LogFilter, LogStream, WalletProvider};
use crate::config::DappConfig;
use crate::error::ProviderError;
use crate::networks::{parse_chain_id, AddChainParams};
use crate::types::{TxReceipt, WalletEvent};

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: Option<String>,
    gas_used: String,
    /// Absent on pre-Byzantium chains
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<String>,
    transaction_hash: Option<TxHash>,
}

/// Parse a hex quantity (`0x1a`)
pub fn parse_quantity(value: &str) -> Result<u64, ProviderError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::new(-32700, format!("invalid quantity '{}'", value)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::new(-32700, format!("invalid quantity '{}': {}", value, e)))
}

pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Unwrap a JSON-RPC response into its result or a coded provider error
fn into_result<T: DeserializeOwned>(method: &str, response: RpcResponse) -> Result<T, ProviderError> {
    if let Some(error) = response.error {
        return Err(ProviderError::new(error.code, error.message));
    }
    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result)
        .map_err(|e| ProviderError::new(-32700, format!("invalid {} result: {}", method, e)))
}

fn transaction_object(request: &CallRequest) -> Value {
    let mut tx = json!({
        "to": request.to,
        "data": request.data,
    });
    if let Some(from) = request.from {
        tx["from"] = json!(from);
    }
    if let Some(gas) = request.gas {
        tx["gas"] = json!(to_quantity(gas));
    }
    tx
}

fn convert_receipt(raw: RpcReceipt) -> Result<TxReceipt, ProviderError> {
    let block_number = raw.block_number.as_deref().map(parse_quantity).transpose()?;
    let status = match raw.status.as_deref() {
        Some(status) => parse_quantity(status)? == 1,
        None => true,
    };
    Ok(TxReceipt {
        transaction_hash: raw.transaction_hash,
        block_number,
        gas_used: parse_quantity(&raw.gas_used)?,
        status,
    })
}

fn convert_log(raw: RpcLog) -> Result<EventLog, ProviderError> {
    Ok(EventLog {
        address: raw.address,
        topics: raw.topics,
        data: raw.data,
        block_number: raw.block_number.as_deref().map(parse_quantity).transpose()?,
        transaction_hash: raw.transaction_hash,
    })
}

fn log_filter_params(filter: &LogFilter, from_block: u64, to_block: u64) -> Value {
    let owner = filter.owner.map(|owner| json!(owner.into_word()));
    json!([{
        "address": filter.address,
        "topics": [filter.event_signature, owner.unwrap_or(Value::Null)],
        "fromBlock": to_quantity(from_block),
        "toBlock": to_quantity(to_block),
    }])
}

/// Shared HTTP transport; cloned into polling tasks
struct RpcTransport {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("RPC #{} {}", id, method);

        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::connectivity)?;

        if !response.status().is_success() {
            return Err(ProviderError::connectivity(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(-32700, format!("invalid JSON-RPC response: {}", e)))?;
        into_result(method, response)
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let head: String = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&head)
    }
}

/// HTTP JSON-RPC client implementing both provider seams
pub struct JsonRpcClient {
    transport: Arc<RpcTransport>,
    wallet_events: broadcast::Sender<WalletEvent>,
    poll_interval: Duration,
}

impl JsonRpcClient {
    pub fn new(config: &DappConfig) -> Arc<Self> {
        let (wallet_events, _) = broadcast::channel(32);
        Arc::new(Self {
            transport: Arc::new(RpcTransport {
                client: reqwest::Client::new(),
                url: config.rpc_url.clone(),
                next_id: AtomicU64::new(1),
            }),
            wallet_events,
            poll_interval: config.event_poll_interval(),
        })
    }

    pub fn url(&self) -> &str {
        &self.transport.url
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        self.transport.request(method, params).await
    }

    /// Poll `eth_accounts` / `eth_chainId` and broadcast changes
    ///
    /// Stops once the client is dropped.
    pub fn spawn_wallet_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let interval = self.poll_interval;

        tokio::spawn(async move {
            let mut last_accounts: Option<Vec<Address>> = None;
            let mut last_chain: Option<u64> = None;

            loop {
                let Some(client) = weak.upgrade() else {
                    break;
                };

                match client.accounts().await {
                    Ok(accounts) => {
                        if last_accounts.as_ref().is_some_and(|prev| *prev != accounts) {
                            info!("Wallet accounts changed: {:?}", accounts);
                            let _ = client
                                .wallet_events
                                .send(WalletEvent::AccountsChanged(accounts.clone()));
                        }
                        last_accounts = Some(accounts);
                    }
                    Err(e) => debug!("eth_accounts poll failed: {}", e),
                }

                match client.chain_id().await {
                    Ok(chain_id) => {
                        if last_chain.is_some_and(|prev| prev != chain_id) {
                            info!("Wallet chain changed: {}", chain_id);
                            let _ = client.wallet_events.send(WalletEvent::ChainChanged(chain_id));
                        }
                        last_chain = Some(chain_id);
                    }
                    Err(e) => debug!("eth_chainId poll failed: {}", e),
                }

                drop(client);
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcClient {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_requestAccounts", json!([])).await
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let hex: String = self.request("eth_chainId", json!([])).await?;
        parse_chain_id(&hex)
            .ok_or_else(|| ProviderError::new(-32700, format!("invalid chain id '{}'", hex)))
    }

    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError> {
        let _: Value = self
            .request("wallet_switchEthereumChain", json!([{ "chainId": hex_chain_id }]))
            .await?;
        Ok(())
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        let _: Value = self
            .request("wallet_addEthereumChain", json!([params]))
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.wallet_events.subscribe()
    }

    async fn is_connected(&self) -> bool {
        self.chain_id().await.is_ok()
    }
}

#[async_trait]
impl ContractBackend for JsonRpcClient {
    async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError> {
        self.request("eth_call", json!([transaction_object(request), "latest"]))
            .await
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError> {
        let gas: String = self
            .request("eth_estimateGas", json!([transaction_object(request)]))
            .await?;
        parse_quantity(&gas)
    }

    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, ProviderError> {
        self.request("eth_sendTransaction", json!([transaction_object(request)]))
            .await
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TxReceipt>, ProviderError> {
        let raw: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        raw.map(convert_receipt).transpose()
    }

    async fn watch_logs(&self, filter: LogFilter) -> Result<LogStream, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut cursor = self.transport.block_number().await? + 1;
        let client = self.transport.clone();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            debug!("Polling logs for {:?} from block {}", filter.event_signature, cursor);
            loop {
                tokio::time::sleep(interval).await;
                if tx.is_closed() {
                    break;
                }

                let head = match client.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!("eth_blockNumber failed: {}", e);
                        continue;
                    }
                };
                if head < cursor {
                    continue;
                }

                let logs: Vec<RpcLog> = match client
                    .request("eth_getLogs", log_filter_params(&filter, cursor, head))
                    .await
                {
                    Ok(logs) => logs,
                    Err(e) => {
                        warn!("eth_getLogs failed: {}", e);
                        continue;
                    }
                };

                for raw in logs {
                    match convert_log(raw) {
                        Ok(log) if filter.matches(&log) => {
                            if tx.send(log).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Skipping malformed log: {}", e),
                    }
                }
                cursor = head + 1;
            }
            debug!("Log poller for {:?} stopped", filter.event_signature);
        });

        Ok(rx)
    }
}
