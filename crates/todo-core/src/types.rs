//! ============================================================================
//! Core Types for the Todo DApp
//! ============================================================================
//! Todo records, aggregate stats, transaction bookkeeping, contract events
//! and wallet notifications. Serializable so a frontend can consume them
//! as JSON.
//! ============================================================================

use alloy_primitives::{Address, TxHash, B256, U256};
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A todo as last read from the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: U256,
    /// Decoded text with padding removed
    pub content: String,
    /// Raw `bytes32` slot as stored on-chain
    pub content_bytes: B256,
    pub is_completed: bool,
    /// Unix seconds
    pub timestamp: u64,
    pub owner: Address,
}

impl Todo {
    /// Creation time in the local timezone, e.g. `2024-03-01 14:02:11`
    pub fn created_at_display(&self) -> String {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|ts| Local.timestamp_opt(ts, 0).single())
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| format!("(invalid: {})", self.timestamp))
    }
}

/// Aggregate counts shown next to the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TodoStats {
    pub fn from_todos(todos: &[Todo]) -> Self {
        let completed = todos.iter().filter(|t| t.is_completed).count();
        Self {
            total: todos.len(),
            completed,
            pending: todos.len() - completed,
        }
    }
}

/// List filter offered by the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TodoFilter {
    pub fn matches(&self, todo: &Todo) -> bool {
        match self {
            TodoFilter::All => true,
            TodoFilter::Active => !todo.is_completed,
            TodoFilter::Completed => todo.is_completed,
        }
    }
}

impl std::str::FromStr for TodoFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(TodoFilter::All),
            "active" | "pending" => Ok(TodoFilter::Active),
            "completed" | "done" => Ok(TodoFilter::Completed),
            _ => Err(format!(
                "Unknown filter '{}'. Valid values: all, active, completed",
                s
            )),
        }
    }
}

/// State-changing contract calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Create,
    Complete,
    Delete,
}

impl TxKind {
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Create => "create",
            TxKind::Complete => "complete",
            TxKind::Delete => "delete",
        }
    }

    /// Event the contract emits when this call succeeds
    pub fn event_kind(&self) -> TodoEventKind {
        match self {
            TxKind::Create => TodoEventKind::Created,
            TxKind::Complete => TodoEventKind::Completed,
            TxKind::Delete => TodoEventKind::Deleted,
        }
    }
}

/// Where a transaction's gas limit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum GasLimit {
    /// Node estimate plus the configured safety margin
    Estimated { estimate: u64, limit: u64 },
    /// Fixed ceiling used because estimation failed
    Fallback { limit: u64 },
}

impl GasLimit {
    pub fn limit(&self) -> u64 {
        match self {
            GasLimit::Estimated { limit, .. } | GasLimit::Fallback { limit } => *limit,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GasLimit::Fallback { .. })
    }
}

/// A submitted transaction awaiting its receipt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub hash: TxHash,
    pub gas: GasLimit,
}

/// Receipt fields the client cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `true` when execution succeeded
    pub status: bool,
}

static NEXT_BINDING: AtomicU64 = AtomicU64::new(1);

/// Identity of one contract binding; a rebind always gets a fresh id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(u64);

impl BindingId {
    pub fn next() -> Self {
        Self(NEXT_BINDING.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

/// Domain events emitted by the TodoList contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoEventKind {
    Created,
    Completed,
    Deleted,
}

impl TodoEventKind {
    pub const ALL: [TodoEventKind; 3] = [
        TodoEventKind::Created,
        TodoEventKind::Completed,
        TodoEventKind::Deleted,
    ];

    pub fn event_name(&self) -> &'static str {
        match self {
            TodoEventKind::Created => "TodoCreated",
            TodoEventKind::Completed => "TodoCompleted",
            TodoEventKind::Deleted => "TodoDeleted",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            TodoEventKind::Created => "Todo created successfully!",
            TodoEventKind::Completed => "Todo completed successfully!",
            TodoEventKind::Deleted => "Todo deleted successfully!",
        }
    }
}

/// A decoded contract event, tagged with the binding that delivered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoEvent {
    pub kind: TodoEventKind,
    pub owner: Address,
    pub id: U256,
    pub binding: BindingId,
    pub transaction_hash: Option<TxHash>,
}

/// Notifications pushed by the wallet provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
    Info,
    Warning,
}

/// Transient toast shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: StatusKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: StatusKind::Error, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: StatusKind::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { kind: StatusKind::Warning, text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: u64, done: bool) -> Todo {
        Todo {
            id: U256::from(id),
            content: format!("todo {}", id),
            content_bytes: B256::ZERO,
            is_completed: done,
            timestamp: 1_700_000_000,
            owner: Address::ZERO,
        }
    }

    #[test]
    fn test_stats() {
        let todos = vec![todo(1, false), todo(2, true), todo(3, true)];
        let stats = TodoStats::from_todos(&todos);
        assert_eq!(stats, TodoStats { total: 3, completed: 2, pending: 1 });
        assert_eq!(TodoStats::from_todos(&[]), TodoStats::default());
    }

    #[test]
    fn test_filter() {
        let todos = vec![todo(1, false), todo(2, true)];
        let active: Vec<_> = todos.iter().filter(|t| TodoFilter::Active.matches(t)).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, U256::from(1));
        assert_eq!("completed".parse::<TodoFilter>(), Ok(TodoFilter::Completed));
        assert!("bogus".parse::<TodoFilter>().is_err());
    }

    #[test]
    fn test_binding_ids_are_unique() {
        let a = BindingId::next();
        let b = BindingId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_gas_limit() {
        let estimated = GasLimit::Estimated { estimate: 50_000, limit: 60_000 };
        assert_eq!(estimated.limit(), 60_000);
        assert!(!estimated.is_fallback());
        assert!(GasLimit::Fallback { limit: 100_000 }.is_fallback());
    }

    #[test]
    fn test_created_at_display() {
        let display = todo(1, false).created_at_display();
        assert!(display.starts_with("2023-11-1"));
    }
}
