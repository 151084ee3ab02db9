//! UI-facing snapshot: display strings, todo list, counts, toasts and the
//! loading flag. The presentation layer renders this; nothing here draws.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{StatusMessage, Todo, TodoFilter, TodoStats};

pub const NOT_CONNECTED: &str = "Not Connected";
pub const UNSUPPORTED_NETWORK: &str = "Unsupported Network";
pub const DEFAULT_LOADING: &str = "Processing Transaction...";

/// `0x1234...abcd`: first six characters, then from index 38
pub fn shorten_address(address: &Address) -> String {
    let full = format!("{:#x}", address);
    format!("{}...{}", &full[..6], &full[38..])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiState {
    pub account_display: String,
    pub network_display: String,
    pub todos: Vec<Todo>,
    pub stats: TodoStats,
    pub toasts: VecDeque<StatusMessage>,
    /// Loading overlay label; `None` when hidden
    pub loading: Option<String>,
    #[serde(skip)]
    toast_capacity: usize,
}

impl UiState {
    pub fn new(toast_capacity: usize) -> Self {
        Self {
            account_display: NOT_CONNECTED.to_string(),
            network_display: NOT_CONNECTED.to_string(),
            todos: Vec::new(),
            stats: TodoStats::default(),
            toasts: VecDeque::new(),
            loading: None,
            toast_capacity: toast_capacity.max(1),
        }
    }

    pub fn set_account(&mut self, account: Option<Address>) {
        self.account_display = match account {
            Some(address) => shorten_address(&address),
            None => NOT_CONNECTED.to_string(),
        };
    }

    pub fn set_network(&mut self, name: impl Into<String>) {
        self.network_display = name.into();
    }

    /// Replace the snapshot with a fresh read; stats always follow the list
    pub fn set_todos(&mut self, todos: Vec<Todo>) {
        self.stats = TodoStats::from_todos(&todos);
        self.todos = todos;
    }

    pub fn clear_todos(&mut self) {
        self.set_todos(Vec::new());
    }

    pub fn visible(&self, filter: TodoFilter) -> Vec<&Todo> {
        self.todos.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn push_status(&mut self, message: StatusMessage) {
        while self.toasts.len() >= self.toast_capacity.max(1) {
            self.toasts.pop_front();
        }
        self.toasts.push_back(message);
    }

    pub fn drain_toasts(&mut self) -> Vec<StatusMessage> {
        self.toasts.drain(..).collect()
    }

    pub fn show_loading(&mut self, label: Option<&str>) {
        self.loading = Some(label.unwrap_or(DEFAULT_LOADING).to_string());
    }

    pub fn hide_loading(&mut self) {
        self.loading = None;
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusKind;
    use alloy_primitives::{address, B256, U256};

    #[test]
    fn test_shorten_address() {
        let addr = address!("A89072A3093A5128685C017f2c855C5Ed9D24D6d");
        assert_eq!(shorten_address(&addr), "0xa890...4d6d");
    }

    #[test]
    fn test_account_display() {
        let mut ui = UiState::default();
        assert_eq!(ui.account_display, NOT_CONNECTED);
        ui.set_account(Some(address!("00057425Af8DC24D3070284850629Fde76B85D26")));
        assert_eq!(ui.account_display, "0x0005...5d26");
        ui.set_account(None);
        assert_eq!(ui.account_display, NOT_CONNECTED);
    }

    #[test]
    fn test_toast_capacity() {
        let mut ui = UiState::new(2);
        ui.push_status(StatusMessage::info("one"));
        ui.push_status(StatusMessage::info("two"));
        ui.push_status(StatusMessage::error("three"));

        let toasts = ui.drain_toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].text, "two");
        assert_eq!(toasts[1].kind, StatusKind::Error);
        assert!(ui.toasts.is_empty());
    }

    #[test]
    fn test_set_todos_updates_stats() {
        let mut ui = UiState::default();
        let todo = Todo {
            id: U256::from(1),
            content: "Buy milk".into(),
            content_bytes: B256::ZERO,
            is_completed: true,
            timestamp: 0,
            owner: Address::ZERO,
        };
        ui.set_todos(vec![todo]);
        assert_eq!(ui.stats.completed, 1);
        assert_eq!(ui.visible(TodoFilter::Active).len(), 0);
        ui.clear_todos();
        assert_eq!(ui.stats.total, 0);
    }

    #[test]
    fn test_loading_label() {
        let mut ui = UiState::default();
        ui.show_loading(None);
        assert_eq!(ui.loading.as_deref(), Some(DEFAULT_LOADING));
        ui.show_loading(Some("Switching Network..."));
        assert_eq!(ui.loading.as_deref(), Some("Switching Network..."));
        ui.hide_loading();
        assert!(ui.loading.is_none());
    }
}
