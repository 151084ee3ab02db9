//! ============================================================================
//! Todo Orchestrator - list / create / complete / delete
//! ============================================================================
//! Every state-changing operation runs the same pipeline:
//!   validate -> snapshot binding -> estimate gas -> submit -> await receipt
//!   -> refresh list and stats
//!
//! The binding is captured before the first await and compared again before
//! submitting and before writing results, so work started against a
//! superseded contract never reaches the session or the UI.
//! ============================================================================

use alloy_primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::backend::CallRequest;
use crate::context::DappContext;
use crate::contract::BoundContract;
use crate::error::{DappError, TxStage};
use crate::transaction::TransactionSender;
use crate::types::{BindingId, StatusMessage, Todo, TxKind, TxReceipt};
use crate::validators::encode_content;

pub struct TodoOrchestrator {
    ctx: DappContext,
}

impl TodoOrchestrator {
    pub fn new(ctx: DappContext) -> Self {
        Self { ctx }
    }

    /// Current binding, account and a request built against them
    async fn prepare<F>(&self, build: F) -> Result<(BindingId, CallRequest), DappError>
    where
        F: FnOnce(&BoundContract, Address) -> CallRequest,
    {
        let session = self.ctx.session.read().await;
        let contract = session.contract().ok_or(DappError::ContractNotBound)?;
        let account = session.account().ok_or(DappError::WalletNotConnected)?;
        Ok((contract.id(), build(contract, account)))
    }

    async fn is_current(&self, binding: BindingId) -> bool {
        self.ctx.session.read().await.binding() == Some(binding)
    }

    async fn fetch(&self) -> Result<(BindingId, Vec<Todo>), DappError> {
        let (binding, request) = self
            .prepare(|contract, account| contract.get_todos(account))
            .await?;

        let data = self
            .ctx
            .backend
            .call(&request)
            .await
            .map_err(|e| DappError::contract(TxStage::Call, e))?;
        let todos = BoundContract::decode_todos(&data)?;
        debug!("Loaded {} todos via {}", todos.len(), binding);
        Ok((binding, todos))
    }

    /// All todos of the current account, content decoded
    pub async fn list(&self) -> Result<Vec<Todo>, DappError> {
        self.fetch().await.map(|(_, todos)| todos)
    }

    /// Re-read the list and publish it (with stats) to the UI snapshot
    ///
    /// A read that finishes after the binding changed is discarded.
    pub async fn refresh(&self) -> Result<Vec<Todo>, DappError> {
        let (binding, todos) = self.fetch().await?;
        if !self.is_current(binding).await {
            debug!("Discarding list read from superseded {}", binding);
            return Err(DappError::StaleBinding);
        }
        self.ctx.ui.write().await.set_todos(todos.clone());
        Ok(todos)
    }

    pub async fn create(&self, content: &str) -> Result<TxReceipt, DappError> {
        // Fails before any network request
        let word = encode_content(content)?;
        info!("Creating todo \"{}\"", content.trim());
        self.execute(TxKind::Create, |contract, account| {
            contract.add_todo(account, word)
        })
        .await
    }

    /// Mark a todo completed
    ///
    /// The cached list is checked first; the contract stays the authority
    /// when the todo is not cached.
    pub async fn complete(&self, id: U256) -> Result<TxReceipt, DappError> {
        let cached_done = self
            .ctx
            .ui
            .read()
            .await
            .todos
            .iter()
            .any(|t| t.id == id && t.is_completed);
        if cached_done {
            return Err(DappError::AlreadyCompleted(id));
        }

        self.execute(TxKind::Complete, |contract, account| {
            contract.mark_completed(account, id)
        })
        .await
    }

    pub async fn delete(&self, id: U256) -> Result<TxReceipt, DappError> {
        self.execute(TxKind::Delete, |contract, account| {
            contract.delete_todo(account, id)
        })
        .await
    }

    async fn execute<F>(&self, kind: TxKind, build: F) -> Result<TxReceipt, DappError>
    where
        F: FnOnce(&BoundContract, Address) -> CallRequest,
    {
        let (binding, request) = self.prepare(build).await?;
        let sender = TransactionSender::new(self.ctx.backend.as_ref(), &self.ctx.config);

        let gas = sender.gas_limit(kind, &request).await;
        if gas.is_fallback() {
            self.ctx
                .notify(StatusMessage::warning(format!(
                    "Gas estimation failed, using fallback limit of {}",
                    gas.limit()
                )))
                .await;
        }

        if !self.is_current(binding).await {
            warn!("Not submitting {}: {} was superseded", kind.label(), binding);
            return Err(DappError::StaleBinding);
        }

        let pending = sender.submit(kind, request, gas).await?;
        let receipt = sender.send_and_confirm(&pending).await?;

        self.ctx
            .announce(kind.event_kind(), receipt.transaction_hash)
            .await;

        match self.refresh().await {
            Ok(_) => {}
            Err(DappError::StaleBinding) => {
                debug!("{} confirmed after {} was superseded", kind.label(), binding);
            }
            Err(e) => warn!("Refresh after {} failed: {}", kind.label(), e),
        }
        Ok(receipt)
    }
}
