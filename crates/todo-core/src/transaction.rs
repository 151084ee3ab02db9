//! ============================================================================
//! Transaction Sending - Gas Estimation & Receipt Polling
//! ============================================================================
//! Provides transaction submission with:
//! - Gas estimation padded by a safety margin
//! - Fixed per-kind gas ceiling when estimation itself fails
//! - Receipt polling bounded by a configurable timeout
//!
//! Nothing here retries a submission; a retry is a new user action.
//! ============================================================================

use alloy_primitives::TxHash;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::backend::{CallRequest, ContractBackend};
use crate::config::DappConfig;
use crate::error::{DappError, TxStage};
use crate::types::{GasLimit, PendingTransaction, TxKind, TxReceipt};

/// Outcome of waiting for a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// Mined with success status
    Confirmed(TxReceipt),
    /// Mined but execution failed
    Reverted(TxReceipt),
    /// Not mined before the deadline (may still confirm later)
    ConfirmationTimeout(TxHash),
}

/// Receipt polling configuration
#[derive(Debug, Clone)]
pub struct ConfirmConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl From<&DappConfig> for ConfirmConfig {
    fn from(config: &DappConfig) -> Self {
        Self {
            poll_interval: config.receipt_poll_interval(),
            timeout: config.receipt_timeout(),
        }
    }
}

/// `estimate + estimate * margin / 100`, saturating
pub fn pad_gas(estimate: u64, margin_percent: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(margin_percent) / 100)
}

/// Gas ceiling used when the node cannot estimate
pub fn fallback_gas(kind: TxKind, config: &DappConfig) -> u64 {
    match kind {
        TxKind::Create => config.fallback_gas_create,
        TxKind::Complete | TxKind::Delete => config.fallback_gas_mutate,
    }
}

/// Estimates, submits and confirms contract transactions
pub struct TransactionSender<'a> {
    backend: &'a dyn ContractBackend,
    config: &'a DappConfig,
    confirm: ConfirmConfig,
}

impl<'a> TransactionSender<'a> {
    pub fn new(backend: &'a dyn ContractBackend, config: &'a DappConfig) -> Self {
        Self {
            backend,
            config,
            confirm: ConfirmConfig::from(config),
        }
    }

    /// Estimate gas for the request; fall back to the fixed ceiling on failure
    pub async fn gas_limit(&self, kind: TxKind, request: &CallRequest) -> GasLimit {
        match self.backend.estimate_gas(request).await {
            Ok(estimate) => {
                let limit = pad_gas(estimate, self.config.gas_margin_percent);
                debug!(
                    "Gas for {}: estimate {} -> limit {} (+{}%)",
                    kind.label(),
                    estimate,
                    limit,
                    self.config.gas_margin_percent
                );
                GasLimit::Estimated { estimate, limit }
            }
            Err(e) => {
                let limit = fallback_gas(kind, self.config);
                warn!(
                    "Gas estimation for {} failed ({}); using fallback limit {}",
                    kind.label(),
                    e,
                    limit
                );
                GasLimit::Fallback { limit }
            }
        }
    }

    /// Submit with the given gas limit
    pub async fn submit(
        &self,
        kind: TxKind,
        request: CallRequest,
        gas: GasLimit,
    ) -> Result<PendingTransaction, DappError> {
        let request = request.with_gas(gas.limit());
        let hash = self
            .backend
            .send_transaction(&request)
            .await
            .map_err(|e| DappError::contract(TxStage::Submit, e))?;

        info!("Transaction sent: {} ({}, gas {})", hash, kind.label(), gas.limit());
        Ok(PendingTransaction { kind, hash, gas })
    }

    /// Poll for the receipt until it appears or the timeout elapses
    pub async fn poll_confirmation(&self, hash: TxHash) -> SendResult {
        info!("Polling confirmation for {}", hash);
        let deadline = Instant::now() + self.confirm.timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.backend.transaction_receipt(hash).await {
                Ok(Some(receipt)) if receipt.status => {
                    info!("Transaction confirmed: {} (poll attempt {})", hash, attempt);
                    return SendResult::Confirmed(receipt);
                }
                Ok(Some(receipt)) => {
                    warn!("Transaction failed on-chain: {}", hash);
                    return SendResult::Reverted(receipt);
                }
                Ok(None) => {
                    debug!("Transaction not yet mined (attempt {})", attempt);
                }
                Err(e) => {
                    // Keep polling through transient RPC errors
                    warn!("Error checking receipt (attempt {}): {}", attempt, e);
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    "Confirmation polling timed out for {} after {} attempts",
                    hash, attempt
                );
                return SendResult::ConfirmationTimeout(hash);
            }
            sleep(self.confirm.poll_interval).await;
        }
    }

    /// Submit and wait for a receipt, mapping failures onto `DappError`
    pub async fn send_and_confirm(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TxReceipt, DappError> {
        let result = self.poll_confirmation(pending.hash).await;
        send_result_to_result(result, self.confirm.timeout)
    }
}

/// Convert a polling outcome into the operation result
pub fn send_result_to_result(result: SendResult, timeout: Duration) -> Result<TxReceipt, DappError> {
    match result {
        SendResult::Confirmed(receipt) => Ok(receipt),
        SendResult::Reverted(receipt) => {
            Err(DappError::TransactionFailed(receipt.transaction_hash))
        }
        SendResult::ConfirmationTimeout(hash) => Err(DappError::TransactionTimeout {
            hash,
            secs: timeout.as_secs(),
        }),
    }
}
