//! Imperative single-shot actions (send, approve, write, sign, estimate).
//!
//! An action owns its own [`StateCell`], separate from any read binding, and
//! follows the same tag-and-discard discipline: when calls overlap, only the
//! most recently issued call may write state. Every caller still receives
//! its own result.
//!
//! # Propagation
//! - [`ActionController::invoke`]: captures the error into state and returns it
//! - [`ActionController::invoke_safe`]: captures the error into state, logs
//!   it, returns `None`

use async_trait::async_trait;
use std::sync::Arc;

use crate::observability::metrics;
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::reducer::Outcome;
use crate::sync::state::{BindingId, ObservableState, StateCell, StateReceiver};

/// Write-style capability.
#[async_trait]
pub trait Invoke: Send + Sync + 'static {
    type Args: Send + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Reject requests that cannot be attempted. Runs before loading is shown.
    fn check(&self, _args: &Self::Args) -> SyncResult<()> {
        Ok(())
    }

    async fn invoke(&self, args: Self::Args) -> SyncResult<Self::Output>;
}

/// Runs one [`Invoke`] capability and tracks its last result.
pub struct ActionController<I: Invoke> {
    invoker: Arc<I>,
    cell: Arc<StateCell<I::Output>>,
    slot: BindingId,
}

impl<I: Invoke> Clone for ActionController<I> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            cell: Arc::clone(&self.cell),
            slot: self.slot,
        }
    }
}

impl<I: Invoke> ActionController<I> {
    pub fn new(invoker: Arc<I>) -> Self {
        let cell = Arc::new(StateCell::new());
        let slot = cell.activate();
        Self {
            invoker,
            cell,
            slot,
        }
    }

    /// Run the action, recording the outcome and returning it.
    pub async fn invoke(&self, args: I::Args) -> SyncResult<I::Output> {
        let action = self.invoker.name();

        if let Err(e) = self.invoker.check(&args) {
            self.cell.reject(self.slot, e.clone());
            metrics::record_action(action, e.label());
            return Err(e);
        }

        let Some(generation) = self.cell.begin(self.slot) else {
            return Err(SyncError::CollaboratorUnavailable(format!(
                "{action} is no longer active"
            )));
        };

        let result = self.invoker.invoke(args).await;
        let disposition = self.cell.settle(Outcome {
            generation,
            result: result.clone(),
        });

        match &result {
            Ok(_) => metrics::record_action(action, "ok"),
            Err(e) => metrics::record_action(action, e.label()),
        }
        if !disposition.is_applied() {
            tracing::debug!(
                action,
                generation = generation.0,
                "Superseded action result not recorded"
            );
        }

        result
    }

    /// Run the action; on failure record and log the error and return `None`.
    pub async fn invoke_safe(&self, args: I::Args) -> Option<I::Output> {
        match self.invoke(args).await {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!(action = self.invoker.name(), error = %e, "Action failed");
                None
            }
        }
    }

    /// Last recorded state.
    pub fn state(&self) -> ObservableState<I::Output> {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> StateReceiver<I::Output> {
        self.cell.subscribe()
    }

    /// Forget the last result. Anything still in flight is discarded.
    pub fn reset(&self) {
        self.cell.clear(self.slot);
    }
}
