//! ============================================================================
//! TODO-CORE: wallet session + contract orchestration
//! ============================================================================
//! This crate holds everything behind the Todo DApp UI:
//! - Wallet session state (account, chain, bound contract)
//! - Chain switching through the wallet's switch / add-chain protocol
//! - TodoList contract binding, event subscriptions and reconciliation
//! - Todo operations with gas estimation and receipt confirmation
//! - JSON-RPC transport implementing the wallet and contract seams
//! ============================================================================

pub mod app;
pub mod backend;
pub mod binder;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod error_translator;
pub mod networks;
pub mod orchestrator;
pub mod reconciler;
pub mod rpc;
pub mod session;
pub mod switcher;
pub mod transaction;
pub mod types;
pub mod ui;
pub mod validators;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use types::*;
pub use app::TodoDapp;
pub use backend::{CallRequest, ContractBackend, WalletProvider};
pub use config::DappConfig;
pub use contract::{abi_source_for, AbiSource, BoundContract, InlineAbiSource};
pub use error::{DappError, ProviderError, ValidationError};
pub use networks::{NetworkDescriptor, NetworkRegistry};
pub use rpc::JsonRpcClient;
pub use session::{SessionSnapshot, SessionState};
pub use ui::UiState;
