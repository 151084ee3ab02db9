//! ============================================================================
//! Error Translator - Raw provider failures to user-facing messages
//! ============================================================================
//! Priority order (first match wins):
//! 1. user rejection code
//! 2. chain not added code
//! 3. request already pending / internal RPC codes
//! 4. revert reason in the message text
//! 5. connectivity wording in the message text
//! 6. known client messages, caller default, then the raw message
//!
//! Revert extraction runs before the connectivity check because revert
//! reasons are arbitrary contract text and may mention "network".
//! ============================================================================

use crate::error::{
    DappError, ProviderError, INTERNAL_RPC_ERROR, REQUEST_PENDING, UNRECOGNIZED_CHAIN,
    USER_REJECTED,
};

pub const MSG_USER_REJECTED: &str = "Transaction rejected by user";
pub const MSG_CHAIN_NOT_ADDED: &str = "This network has not been added to your wallet";
pub const MSG_REQUEST_PENDING: &str =
    "A request is already pending in your wallet. Please open your wallet to continue";
pub const MSG_INTERNAL_RPC: &str = "Internal JSON-RPC error. Please try again";
pub const MSG_REVERTED: &str = "Transaction reverted";
pub const MSG_NETWORK: &str = "Network error. Please check your connection";
pub const MSG_FALLBACK: &str = "An error occurred";

/// Client-side messages that are already fit for display
const KNOWN_MESSAGES: [&str; 4] = [
    "Smart contract not initialized",
    "Wallet not connected",
    "Network error",
    "Transaction failed",
];

const CONNECTIVITY_MARKERS: [&str; 6] = [
    "network",
    "connection",
    "timed out",
    "unreachable",
    "failed to fetch",
    "dns error",
];

/// Map a raw provider error to a display string
pub fn translate(raw: &ProviderError, default: Option<&str>) -> String {
    match raw.code {
        USER_REJECTED => return MSG_USER_REJECTED.to_string(),
        UNRECOGNIZED_CHAIN => return MSG_CHAIN_NOT_ADDED.to_string(),
        REQUEST_PENDING => return MSG_REQUEST_PENDING.to_string(),
        INTERNAL_RPC_ERROR => return MSG_INTERNAL_RPC.to_string(),
        _ => {}
    }

    let message = raw.message.as_str();
    let lower = message.to_ascii_lowercase();

    if lower.contains("revert") {
        return extract_revert_reason(message)
            .unwrap_or_else(|| MSG_REVERTED.to_string());
    }

    if CONNECTIVITY_MARKERS.iter().any(|m| lower.contains(m)) {
        return MSG_NETWORK.to_string();
    }

    if KNOWN_MESSAGES.contains(&message) {
        return message.to_string();
    }

    match default {
        Some(d) => d.to_string(),
        None if !message.trim().is_empty() => message.to_string(),
        None => MSG_FALLBACK.to_string(),
    }
}

/// Pull the reason out of node messages such as
/// `execution reverted: Not owner` or `VM Exception ... revert Not owner"`.
fn extract_revert_reason(message: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `message`
    let lower = message.to_ascii_lowercase();

    let start = if let Some(pos) = lower.find("reverted:") {
        pos + "reverted:".len()
    } else if let Some(pos) = lower.find("revert ") {
        pos + "revert ".len()
    } else {
        return None;
    };

    let rest = &message[start..];
    let reason = match rest.find('"') {
        Some(end) => &rest[..end],
        None => rest,
    };

    let reason = reason.trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}

/// Display string for any operation failure
///
/// Provider-backed failures go through [`translate`]; locally decided
/// failures already carry a readable message.
pub fn describe(err: &DappError) -> String {
    match err {
        DappError::AddFailed(_) => "Failed to add network to wallet".to_string(),
        DappError::TransactionFailed(_) => "Transaction failed".to_string(),
        DappError::TransactionTimeout { secs, .. } => format!(
            "Transaction was not confirmed within {}s. It may still be mined",
            secs
        ),
        other => match other.provider_error() {
            Some(raw) => translate(raw, None),
            None => other.to_string(),
        },
    }
}
