//! ============================================================================
//! Network Registry - Supported chains and their TodoList deployments
//! ============================================================================
//! This table is the single place new networks are added.
//! ============================================================================

use alloy_primitives::{address, Address};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Avalanche Fuji testnet
pub const FUJI_CHAIN_ID: u64 = 43113;

/// RTC mainnet
pub const RTC_CHAIN_ID: u64 = 32323;

/// Native currency metadata for `wallet_addEthereumChain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// EIP-3085 `wallet_addEthereumChain` parameter object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

/// A supported chain and the TodoList contract deployed on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub hex_chain_id: String,
    pub name: String,
    pub contract_address: Address,
    pub add_chain_params: AddChainParams,
}

impl NetworkDescriptor {
    /// Build a descriptor; the hex id is always derived from `chain_id`
    pub fn new(
        chain_id: u64,
        name: &str,
        contract_address: Address,
        currency: NativeCurrency,
        rpc_urls: &[&str],
        block_explorer_urls: &[&str],
    ) -> Self {
        let hex_chain_id = to_hex_chain_id(chain_id);
        Self {
            chain_id,
            hex_chain_id: hex_chain_id.clone(),
            name: name.to_string(),
            contract_address,
            add_chain_params: AddChainParams {
                chain_id: hex_chain_id,
                chain_name: name.to_string(),
                native_currency: currency,
                rpc_urls: rpc_urls.iter().map(|s| s.to_string()).collect(),
                block_explorer_urls: block_explorer_urls.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

/// `43113` -> `0xA869`
pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("0x{:X}", chain_id)
}

/// Parse a wallet-reported chain id (`0xa869`, `0xA869` or `43113`)
pub fn parse_chain_id(value: &str) -> Option<u64> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

static BUILTIN: Lazy<Vec<NetworkDescriptor>> = Lazy::new(|| {
    vec![
        NetworkDescriptor::new(
            FUJI_CHAIN_ID,
            "Avalanche Fuji Testnet",
            address!("A89072A3093A5128685C017f2c855C5Ed9D24D6d"),
            NativeCurrency {
                name: "AVAX".into(),
                symbol: "AVAX".into(),
                decimals: 18,
            },
            &["https://api.avax-test.network/ext/bc/C/rpc"],
            &["https://testnet.snowtrace.io/"],
        ),
        NetworkDescriptor::new(
            RTC_CHAIN_ID,
            "RTC Mainnet",
            address!("00057425Af8DC24D3070284850629Fde76B85D26"),
            NativeCurrency {
                name: "RTC".into(),
                symbol: "RTC".into(),
                decimals: 18,
            },
            &["https://mainnet.reltime.com"],
            &["https://explorer.reltime.com"],
        ),
    ]
});

/// Read-only lookup table of supported networks
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkDescriptor>,
}

impl NetworkRegistry {
    pub fn new(networks: impl IntoIterator<Item = NetworkDescriptor>) -> Self {
        Self {
            networks: networks.into_iter().map(|n| (n.chain_id, n)).collect(),
        }
    }

    /// The deployed testnet + mainnet configuration
    pub fn builtin() -> Self {
        Self::new(BUILTIN.iter().cloned())
    }

    pub fn lookup(&self, chain_id: u64) -> Option<&NetworkDescriptor> {
        self.networks.get(&chain_id)
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.networks.contains_key(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
