//! ============================================================================
//! Provider Seams - Wallet and contract backends
//! ============================================================================
//! The wallet (accounts, chain selection) and the chain (calls, gas,
//! transactions, logs) are external actors. Both sit behind async traits so
//! the orchestration layer never depends on a concrete transport.
//! ============================================================================

use alloy_primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::ProviderError;
use crate::networks::AddChainParams;
use crate::types::{TxReceipt, WalletEvent};

/// EIP-1193 style wallet provider
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to authorize accounts (`eth_requestAccounts`)
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Accounts already authorized, without prompting (`eth_accounts`)
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// `wallet_switchEthereumChain` with a `0x`-prefixed hex id
    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError>;

    /// `wallet_addEthereumChain`
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError>;

    /// `accountsChanged` / `chainChanged` notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    async fn is_connected(&self) -> bool;
}

/// A contract call or transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub gas: Option<u64>,
}

impl CallRequest {
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from: Some(from),
            to,
            data: data.into(),
            gas: None,
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// A raw log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<TxHash>,
}

/// Log subscription filter: one event signature, optionally one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub event_signature: B256,
    /// Matched against the first indexed topic
    pub owner: Option<Address>,
}

impl LogFilter {
    pub fn matches(&self, log: &EventLog) -> bool {
        if log.address != self.address {
            return false;
        }
        if log.topics.first() != Some(&self.event_signature) {
            return false;
        }
        match self.owner {
            Some(owner) => log.topics.get(1) == Some(&owner.into_word()),
            None => true,
        }
    }
}

/// Stream of matching logs; the producer stops once the receiver is dropped
pub type LogStream = mpsc::UnboundedReceiver<EventLog>;

/// Chain access for one contract: reads, gas, transactions and logs
#[async_trait]
pub trait ContractBackend: Send + Sync {
    /// Read-only `eth_call`, returns the raw return data
    async fn call(&self, request: &CallRequest) -> Result<Bytes, ProviderError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError>;

    /// Sign (via the wallet) and broadcast, returning the hash
    async fn send_transaction(&self, request: &CallRequest) -> Result<TxHash, ProviderError>;

    /// `None` while the transaction is not yet mined
    async fn transaction_receipt(&self, hash: TxHash)
        -> Result<Option<TxReceipt>, ProviderError>;

    async fn watch_logs(&self, filter: LogFilter) -> Result<LogStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_log_filter_matching() {
        let contract = address!("A89072A3093A5128685C017f2c855C5Ed9D24D6d");
        let owner = address!("1111111111111111111111111111111111111111");
        let other = address!("2222222222222222222222222222222222222222");
        let sig = B256::repeat_byte(0xab);

        let log = |addr: Address, who: Address| EventLog {
            address: addr,
            topics: vec![sig, who.into_word()],
            data: Bytes::new(),
            block_number: Some(1),
            transaction_hash: None,
        };

        let filter = LogFilter { address: contract, event_signature: sig, owner: Some(owner) };
        assert!(filter.matches(&log(contract, owner)));
        assert!(!filter.matches(&log(contract, other)));
        assert!(!filter.matches(&log(other, owner)));

        let unfiltered = LogFilter { owner: None, ..filter };
        assert!(unfiltered.matches(&log(contract, other)));
    }
}
