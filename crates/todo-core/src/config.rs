//! ============================================================================
//! DApp Configuration
//! ============================================================================
//! Defaults match the deployed client. Every field can be overridden from
//! the environment (`TODO_DAPP_*`), optionally loaded from a `.env` file.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DappError;

const ENV_PREFIX: &str = "TODO_DAPP_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DappConfig {
    /// JSON-RPC endpoint of the wallet / node
    pub rpc_url: String,
    /// Location of the TodoList ABI resource (file path or http(s) URL)
    pub abi_path: String,
    /// Safety margin added on top of the gas estimate
    pub gas_margin_percent: u64,
    /// Gas ceiling for `addTodo` when estimation fails
    pub fallback_gas_create: u64,
    /// Gas ceiling for `markTodoAsCompleted` / `deleteTodo` when estimation fails
    pub fallback_gas_mutate: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
    /// Upper bound on waiting for the wallet to report a switched chain
    pub chain_settle_timeout_ms: u64,
    pub chain_settle_poll_ms: u64,
    /// Log and wallet-state polling interval for the JSON-RPC backend
    pub event_poll_interval_ms: u64,
    /// Toasts kept for the UI before the oldest is dropped
    pub toast_capacity: usize,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            abi_path: "abis/TodoList.json".to_string(),
            gas_margin_percent: 20,
            fallback_gas_create: 200_000,
            fallback_gas_mutate: 100_000,
            receipt_poll_interval_ms: 1_000,
            receipt_timeout_secs: 120,
            chain_settle_timeout_ms: 1_500,
            chain_settle_poll_ms: 100,
            event_poll_interval_ms: 2_000,
            toast_capacity: 8,
        }
    }
}

impl DappConfig {
    /// Defaults, then `.env`, then process environment
    pub fn from_env() -> Result<Self, DappError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; used by `from_env` and tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DappError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = get("RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(path) = get("ABI_PATH") {
            config.abi_path = path;
        }

        override_parsed(&get, "GAS_MARGIN_PERCENT", &mut config.gas_margin_percent)?;
        override_parsed(&get, "FALLBACK_GAS_CREATE", &mut config.fallback_gas_create)?;
        override_parsed(&get, "FALLBACK_GAS_MUTATE", &mut config.fallback_gas_mutate)?;
        override_parsed(
            &get,
            "RECEIPT_POLL_INTERVAL_MS",
            &mut config.receipt_poll_interval_ms,
        )?;
        override_parsed(&get, "RECEIPT_TIMEOUT_SECS", &mut config.receipt_timeout_secs)?;
        override_parsed(
            &get,
            "CHAIN_SETTLE_TIMEOUT_MS",
            &mut config.chain_settle_timeout_ms,
        )?;
        override_parsed(&get, "CHAIN_SETTLE_POLL_MS", &mut config.chain_settle_poll_ms)?;
        override_parsed(
            &get,
            "EVENT_POLL_INTERVAL_MS",
            &mut config.event_poll_interval_ms,
        )?;
        override_parsed(&get, "TOAST_CAPACITY", &mut config.toast_capacity)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DappError> {
        url::Url::parse(&self.rpc_url)
            .map_err(|e| DappError::Config(format!("rpc_url '{}': {}", self.rpc_url, e)))?;

        if self.receipt_poll_interval_ms == 0 {
            return Err(DappError::Config(
                "receipt_poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.gas_margin_percent > 100 {
            warn!(
                "Gas margin of {}% is unusually high",
                self.gas_margin_percent
            );
        }
        Ok(())
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn chain_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.chain_settle_timeout_ms)
    }

    pub fn chain_settle_poll(&self) -> Duration {
        Duration::from_millis(self.chain_settle_poll_ms.max(1))
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms.max(1))
    }
}

fn override_parsed<T, G>(get: &G, name: &str, slot: &mut T) -> Result<(), DappError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *slot = raw.trim().parse().map_err(|e: T::Err| {
            DappError::Config(format!("{}{}='{}': {}", ENV_PREFIX, name, raw, e))
        })?;
    }
    Ok(())
}
