//! Imperative action semantics.

use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use chain_sync::blockchain::{ChainWriter, EstimateGas, SendTransaction};
use chain_sync::sync::{ActionController, ErrorKind, Invoke, SyncError, SyncResult};

/// Action whose calls complete when the test says so.
#[derive(Default)]
struct Gated {
    pending: Mutex<Vec<oneshot::Sender<SyncResult<u32>>>>,
}

#[async_trait]
impl Invoke for Gated {
    type Args = u32;
    type Output = u32;

    fn name(&self) -> &'static str {
        "gated"
    }

    fn check(&self, args: &u32) -> SyncResult<()> {
        if *args == 0 {
            return Err(SyncError::MissingParameters("amount".to_string()));
        }
        Ok(())
    }

    async fn invoke(&self, _args: u32) -> SyncResult<u32> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(tx);
        rx.await
            .unwrap_or_else(|_| Err(SyncError::RemoteFailure("dropped".to_string())))
    }
}

impl Gated {
    fn release(&self, index: usize, result: SyncResult<u32>) {
        let tx = self.pending.lock().unwrap().remove(index);
        let _ = tx.send(result);
    }

    fn waiting(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

async fn until_waiting(action: &Gated, count: usize) {
    while action.waiting() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_no_provider_safe_returns_none_and_raising_form_errors() {
    let controller = ActionController::new(Arc::new(EstimateGas(ChainWriter::default())));

    let result = controller.invoke_safe(TransactionRequest::default()).await;
    assert!(result.is_none());
    assert_eq!(
        controller.state().error.map(|e| e.kind()),
        Some(ErrorKind::CollaboratorUnavailable)
    );

    let err = controller.invoke(TransactionRequest::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
}

#[tokio::test]
async fn test_send_without_wallet_is_unavailable() {
    let controller = ActionController::new(Arc::new(SendTransaction(ChainWriter::default())));
    let tx = TransactionRequest::default().with_to(Address::repeat_byte(4));
    assert!(controller.invoke_safe(tx).await.is_none());
    assert!(!controller.state().is_loading);
}

#[tokio::test]
async fn test_overlapping_invocations_latest_wins_state() {
    let action = Arc::new(Gated::default());
    let controller = ActionController::new(action.clone());

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.invoke(1).await }
    });
    until_waiting(&action, 1).await;

    let second = tokio::spawn({
        let controller = controller.clone();
        async move { controller.invoke(2).await }
    });
    until_waiting(&action, 2).await;

    // Second call finishes first; the first call's late result is not recorded.
    action.release(1, Ok(20));
    assert_eq!(second.await.unwrap(), Ok(20));
    action.release(0, Ok(10));
    assert_eq!(first.await.unwrap(), Ok(10));

    let state = controller.state();
    assert_eq!(state.data, Some(20));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_failed_check_keeps_data_and_skips_call() {
    let action = Arc::new(Gated::default());
    let controller = ActionController::new(action.clone());

    let call = tokio::spawn({
        let controller = controller.clone();
        async move { controller.invoke(5).await }
    });
    until_waiting(&action, 1).await;
    action.release(0, Ok(50));
    call.await.unwrap().unwrap();

    let err = controller.invoke(0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingParameters);
    assert_eq!(action.waiting(), 0);

    let state = controller.state();
    assert_eq!(state.data, Some(50));
    assert_eq!(state.error, Some(err));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_reset_discards_in_flight_result() {
    let action = Arc::new(Gated::default());
    let controller = ActionController::new(action.clone());

    let call = tokio::spawn({
        let controller = controller.clone();
        async move { controller.invoke(3).await }
    });
    until_waiting(&action, 1).await;

    controller.reset();
    action.release(0, Ok(30));
    assert_eq!(call.await.unwrap(), Ok(30));
    assert_eq!(controller.state(), Default::default());
}
