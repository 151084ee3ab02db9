//! ============================================================================
//! Session State - current account, chain and bound contract
//! ============================================================================
//! Single source of truth shared by every component. Invariants:
//! - a contract is only installed while `chain_id` is set, matches the
//!   contract's chain and resolves in the network registry
//! - changing the chain tears the current contract's subscriptions down
//! - installing a contract tears the previous one down first
//! ============================================================================

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::BoundContract;
use crate::error::DappError;
use crate::networks::NetworkRegistry;
use crate::types::BindingId;

#[derive(Debug, Default)]
pub struct SessionState {
    account: Option<Address>,
    chain_id: Option<u64>,
    contract: Option<BoundContract>,
}

/// Plain copy of the session for display and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub binding: Option<BindingId>,
    pub contract_address: Option<Address>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn contract(&self) -> Option<&BoundContract> {
        self.contract.as_ref()
    }

    pub fn binding(&self) -> Option<BindingId> {
        self.contract.as_ref().map(|c| c.id())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            account: self.account,
            chain_id: self.chain_id,
            binding: self.binding(),
            contract_address: self.contract.as_ref().map(|c| c.address()),
        }
    }

    /// Returns true when the account actually changed
    pub fn set_account(&mut self, account: Option<Address>) -> bool {
        if self.account == account {
            return false;
        }
        info!("Account changed: {:?} -> {:?}", self.account, account);
        self.account = account;
        true
    }

    /// Returns true when the chain actually changed; a change drops the contract
    pub fn set_chain(&mut self, chain_id: Option<u64>) -> bool {
        if self.chain_id == chain_id {
            return false;
        }
        info!("Chain changed: {:?} -> {:?}", self.chain_id, chain_id);
        self.drop_contract();
        self.chain_id = chain_id;
        true
    }

    /// Install a freshly bound contract, replacing (and tearing down) any previous one
    ///
    /// A contract built for a chain other than the current one is torn down
    /// and rejected as stale.
    pub fn set_contract(
        &mut self,
        mut contract: BoundContract,
        registry: &NetworkRegistry,
    ) -> Result<BindingId, DappError> {
        if self.chain_id != Some(contract.chain_id()) {
            debug!(
                "Rejecting {} for chain {} (session chain {:?})",
                contract.id(),
                contract.chain_id(),
                self.chain_id
            );
            contract.teardown();
            return Err(DappError::StaleBinding);
        }

        if !registry.is_supported(contract.chain_id()) {
            contract.teardown();
            return Err(DappError::UnsupportedNetwork(contract.chain_id()));
        }

        self.drop_contract();
        let id = contract.id();
        info!(
            "Installed {} at {} on chain {}",
            id,
            contract.address(),
            contract.chain_id()
        );
        self.contract = Some(contract);
        Ok(id)
    }

    /// Tear down and remove the current contract, if any
    pub fn drop_contract(&mut self) {
        if let Some(mut previous) = self.contract.take() {
            previous.teardown();
        }
    }

    /// Reset everything; safe to call repeatedly
    pub fn clear(&mut self) {
        self.drop_contract();
        self.account = None;
        self.chain_id = None;
    }
}
