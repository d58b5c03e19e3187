//! Behavioural properties of the subscription engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

use chain_sync::sync::{
    wait_settled, BindOptions, ChainEvent, EventSource, ObservableState, SubscriptionController,
    SyncError,
};

mod common;

use common::{settle_tasks, CountingEvents, EchoFetcher, GatedFetcher, ScriptedFetcher};

fn remote(message: &str) -> SyncError {
    SyncError::RemoteFailure(message.to_string())
}

#[tokio::test]
async fn test_stale_outcome_is_discarded() {
    let fetcher = GatedFetcher::new();
    let mut controller = SubscriptionController::new(fetcher.clone());
    let mut rx = controller.bind(Some(1), BindOptions::default());
    fetcher.wait_issued(1).await;

    assert!(controller.refetch());
    fetcher.wait_issued(2).await;

    fetcher.resolve(1, Ok(20));
    let state = wait_settled(&mut rx).await;
    assert_eq!(state.data, Some(20));

    // The older fetch lands last and must not win.
    fetcher.resolve(0, Ok(10));
    settle_tasks().await;
    assert_eq!(controller.state().data, Some(20));
    assert!(!controller.state().is_loading);
}

#[tokio::test]
async fn test_unbind_freezes_state() {
    let fetcher = GatedFetcher::new();
    let mut controller = SubscriptionController::new(fetcher.clone());
    controller.bind(Some(1), BindOptions::default());
    fetcher.wait_issued(1).await;

    controller.unbind();
    let frozen = controller.state();
    assert!(frozen.is_loading);

    fetcher.resolve(0, Ok(5));
    settle_tasks().await;
    assert_eq!(controller.state(), frozen);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unbind_racing_resolution_never_applies_after_return() {
    for _ in 0..200 {
        let fetcher = GatedFetcher::new();
        let mut controller = SubscriptionController::new(fetcher.clone());
        controller.bind(Some(1), BindOptions::default());
        fetcher.wait_issued(1).await;

        let resolver = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.resolve(0, Ok(7)) })
        };
        controller.unbind();
        let frozen = controller.state();

        resolver.await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(controller.state(), frozen);
    }
}

#[tokio::test]
async fn test_listener_pairing_under_random_interleavings() {
    let events = CountingEvents::new();
    let source: Arc<dyn EventSource> = events.clone();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let interval = Duration::from_millis(50);

    let mut controller =
        SubscriptionController::new(EchoFetcher::new()).with_events(source.clone());
    let mut current: Option<(u32, bool)> = None;

    for _ in 0..1000 {
        match rng.gen_range(0..7) {
            0 => {
                let descriptor = rng.gen_range(0..3);
                let watch = rng.gen_bool(0.5);
                controller.bind(Some(descriptor), BindOptions { watch, interval });
                current = Some((descriptor, watch));
            }
            1 => {
                controller.bind(None, BindOptions::default());
                current = None;
            }
            2 => {
                controller.unbind();
                current = None;
            }
            3 => {
                assert_eq!(controller.refetch(), current.is_some());
            }
            4 => events.fire(ChainEvent::NewBlock(rng.gen())),
            5 => {
                controller =
                    SubscriptionController::new(EchoFetcher::new()).with_events(source.clone());
                current = None;
            }
            _ => {
                let descriptor = current.map_or(0, |(d, _)| (d + 1) % 3);
                events.fail_next();
                controller.bind(Some(descriptor), BindOptions { watch: true, interval });
                assert!(matches!(
                    controller.state().error,
                    Some(SyncError::CollaboratorUnavailable(_))
                ));
                current = None;
            }
        }

        let expected = current.map_or(0, |(_, watch)| usize::from(watch));
        assert_eq!(events.active(), expected);
        assert_eq!(controller.is_bound(), current.is_some());

        if rng.gen_bool(0.3) {
            settle_tasks().await;
        }
    }

    drop(controller);
    assert_eq!(events.registered(), events.released());
    assert!(events.registered() > 0);
}

#[tokio::test]
async fn test_error_keeps_previous_data() {
    let fetcher = ScriptedFetcher::new(vec![
        (Duration::ZERO, Ok(42)),
        (Duration::ZERO, Err(remote("node down"))),
    ]);
    let mut controller = SubscriptionController::new(fetcher.clone());
    let mut rx = controller.bind(Some(1), BindOptions::default());
    assert_eq!(wait_settled(&mut rx).await.data, Some(42));

    assert!(controller.refetch());
    let state = wait_settled(&mut rx).await;
    assert_eq!(
        state,
        ObservableState {
            data: Some(42),
            is_loading: false,
            error: Some(remote("node down")),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_polling_refresh_error_keeps_data() {
    let fetcher = ScriptedFetcher::new(vec![
        (Duration::from_millis(50), Ok(42)),
        (Duration::from_millis(50), Err(remote("timeout"))),
    ]);
    let mut controller = SubscriptionController::new(fetcher.clone());
    controller.bind(Some(1), BindOptions::watching(Duration::from_millis(1000)));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        controller.state(),
        ObservableState {
            data: Some(42),
            is_loading: false,
            error: None,
        }
    );

    tokio::time::sleep(Duration::from_millis(960)).await;
    let refreshing = controller.state();
    assert!(refreshing.is_loading);
    assert_eq!(refreshing.data, Some(42));
    assert_eq!(fetcher.calls(), 2);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(
        controller.state(),
        ObservableState {
            data: Some(42),
            is_loading: false,
            error: Some(remote("timeout")),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_polls_latest_issued_wins() {
    let fetcher = ScriptedFetcher::new(vec![
        (Duration::from_millis(1500), Ok(1)),
        (Duration::from_millis(10), Ok(2)),
    ]);
    let mut controller = SubscriptionController::new(fetcher.clone());
    controller.bind(Some(1), BindOptions::watching(Duration::from_millis(1000)));

    // The tick at t=1000 does not wait for the slow initial read.
    tokio::time::sleep(Duration::from_millis(1020)).await;
    assert_eq!(fetcher.calls(), 2);
    let state = controller.state();
    assert_eq!(state.data, Some(2));
    assert!(!state.is_loading);

    // The initial read lands at t=1500 and is discarded.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        controller.state(),
        ObservableState {
            data: Some(2),
            is_loading: false,
            error: None,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_rejected_at_bind() {
    let fetcher = ScriptedFetcher::new(vec![(Duration::ZERO, Ok(1))]);
    let mut controller = SubscriptionController::new(fetcher.clone());
    controller.bind(Some(1), BindOptions::watching(Duration::ZERO));

    assert!(!controller.is_bound());
    assert_eq!(
        controller.state().error,
        Some(SyncError::MissingParameters("interval".to_string()))
    );
    assert!(!controller.refetch());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fetcher.calls(), 0);
    assert!(!controller.state().is_loading);

    // A usable interval on the same controller binds normally.
    let mut rx = controller.bind(Some(1), BindOptions::watching(Duration::from_secs(60)));
    assert_eq!(wait_settled(&mut rx).await.data, Some(1));
    assert!(controller.is_bound());
}

#[tokio::test]
async fn test_rebind_ignores_previous_descriptor() {
    let fetcher = GatedFetcher::new();
    let mut controller = SubscriptionController::new(fetcher.clone());
    controller.bind(Some(1), BindOptions::default());
    fetcher.wait_issued(1).await;

    let mut rx = controller.bind(Some(2), BindOptions::default());
    fetcher.wait_issued(2).await;
    assert_eq!(fetcher.descriptor(1), 2);

    // D1 resolving while D2 is still loading changes nothing.
    fetcher.resolve(0, Ok(1));
    settle_tasks().await;
    let state = controller.state();
    assert!(state.is_loading);
    assert_eq!(state.data, None);

    fetcher.resolve(1, Ok(2));
    assert_eq!(wait_settled(&mut rx).await.data, Some(2));
}

#[tokio::test]
async fn test_event_invalidation_refetches() {
    let events = CountingEvents::new();
    let fetcher = EchoFetcher::new();
    let mut controller = SubscriptionController::new(fetcher.clone()).with_events(events.clone());
    let mut rx = controller.bind(Some(3), BindOptions::watching(Duration::from_secs(60)));
    assert_eq!(wait_settled(&mut rx).await.data, Some(3));
    assert_eq!(events.active(), 1);
    assert_eq!(fetcher.calls(), 1);

    // A burst delivered before the driver runs collapses into one fetch.
    events.fire(ChainEvent::NewBlock(100));
    events.fire(ChainEvent::NewBlock(101));
    settle_tasks().await;
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(controller.state().data, Some(3));

    controller.unbind();
    assert_eq!(events.active(), 0);
    events.fire(ChainEvent::NewBlock(102));
    settle_tasks().await;
    assert_eq!(fetcher.calls(), 2);
}
