//! ============================================================================
//! Error Types - Validation, Provider and Operation Failures
//! ============================================================================
//! Three layers:
//! - ValidationError: local content checks, never touches the network
//! - ProviderError: raw failure reported by the wallet or JSON-RPC endpoint
//! - DappError: the operation-boundary taxonomy reported to the UI
//! ============================================================================

use alloy_primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EIP-1193: the user rejected the request
pub const USER_REJECTED: i64 = 4001;

/// EIP-3326: the requested chain has not been added to the wallet
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// A request of the same kind is already waiting for the user
pub const REQUEST_PENDING: i64 = -32002;

/// Generic JSON-RPC internal error
pub const INTERNAL_RPC_ERROR: i64 = -32603;

/// Transport-level failure (no JSON-RPC response was received)
pub const TRANSPORT_FAILURE: i64 = 0;

/// Rejection reasons for todo content, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    Empty,

    #[error("Content cannot be only whitespace")]
    WhitespaceOnly,

    #[error("Content must be 32 bytes or less")]
    TooLong,

    #[error("Content contains invalid characters")]
    InvalidChars,
}

/// Raw error surfaced by the wallet provider or the RPC node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Failure before any JSON-RPC response arrived (DNS, refused, timed out)
    pub fn connectivity(message: impl std::fmt::Display) -> Self {
        Self::new(TRANSPORT_FAILURE, format!("network error: {}", message))
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN
    }

    pub fn is_connectivity(&self) -> bool {
        self.code == TRANSPORT_FAILURE
    }
}

/// Stage of a contract interaction, kept so messages can say what failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStage {
    Call,
    Estimate,
    Submit,
    Receipt,
}

impl std::fmt::Display for TxStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TxStage::Call => "call",
            TxStage::Estimate => "gas estimation",
            TxStage::Submit => "submission",
            TxStage::Receipt => "receipt lookup",
        };
        f.write_str(label)
    }
}

/// Broad failure classes used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Provider,
    Contract,
    Connectivity,
    State,
}

/// Errors returned by session, binding and todo operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DappError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Please connect to a supported network (chain {0})")]
    UnsupportedNetwork(u64),

    #[error("Failed to load contract ABI: {0}")]
    AbiLoad(String),

    #[error("Network switch rejected: {0}")]
    SwitchRejected(ProviderError),

    #[error("Failed to add network to wallet: {0}")]
    AddFailed(ProviderError),

    #[error("Contract not initialized")]
    ContractNotBound,

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Todo {0} is already completed")]
    AlreadyCompleted(U256),

    #[error("Contract binding changed while the operation was in flight")]
    StaleBinding,

    #[error("Contract {stage} failed: {source}")]
    Contract { stage: TxStage, source: ProviderError },

    #[error("Failed to decode contract response: {0}")]
    Decode(String),

    #[error("Transaction {0} failed")]
    TransactionFailed(TxHash),

    #[error("Transaction {hash} not confirmed within {secs}s")]
    TransactionTimeout { hash: TxHash, secs: u64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DappError {
    pub fn contract(stage: TxStage, source: ProviderError) -> Self {
        Self::Contract { stage, source }
    }

    /// The raw provider error behind this failure, if any
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::SwitchRejected(e) | Self::AddFailed(e) | Self::Provider(e) => Some(e),
            Self::Contract { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        if let Some(raw) = self.provider_error() {
            if raw.is_connectivity() {
                return ErrorCategory::Connectivity;
            }
        }

        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::UnsupportedNetwork(_)
            | Self::SwitchRejected(_)
            | Self::AddFailed(_)
            | Self::Provider(_) => ErrorCategory::Provider,
            Self::AbiLoad(_)
            | Self::Contract { .. }
            | Self::Decode(_)
            | Self::TransactionFailed(_)
            | Self::TransactionTimeout { .. } => ErrorCategory::Contract,
            Self::ContractNotBound
            | Self::WalletNotConnected
            | Self::AlreadyCompleted(_)
            | Self::StaleBinding
            | Self::Config(_) => ErrorCategory::State,
        }
    }

    /// True when the failure was decided locally, before any network request
    pub fn is_local(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::State
        )
    }
}
