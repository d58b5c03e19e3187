//! Subscription controller: owns the lifecycle of one resource binding.
//!
//! # Lifecycle
//! ```text
//! bind(Some(d)) ─▶ activate cell ─▶ initial fetch ─▶ arm invalidation source
//!                                                      │
//!            timer tick / event ──▶ fetch (new generation, same binding)
//!
//! bind(Some(d')) with d' != d ─▶ teardown ─▶ bind(Some(d'))
//! bind(None)                  ─▶ teardown ─▶ reset state to idle
//! unbind() / drop             ─▶ teardown (state frozen)
//!
//! teardown: bump generation ─▶ abort driver ─▶ release listener
//! ```
//!
//! # Design Decisions
//! - Never two bindings per controller: the old one is fully torn down
//!   before the next starts
//! - Overlapping fetches race; only the latest issued may write state
//! - Failures while arming a binding are captured into state, the half-built
//!   binding is torn down, and nothing is returned to the caller

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::sync::error::SyncError;
use crate::sync::executor::{Fetch, FetchExecutor};
use crate::sync::source::{ChainEvent, EventHandler, EventKind, EventSource, Subscription};
use crate::sync::state::{BindingId, ObservableState, StateCell, StateReceiver};

/// Default polling period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

/// Options for [`SubscriptionController::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOptions {
    /// Keep the resource fresh after the initial fetch.
    pub watch: bool,
    /// Polling period, measured from the previous issue.
    pub interval: Duration,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            watch: false,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl BindOptions {
    /// Watching with the given polling period.
    pub fn watching(interval: Duration) -> Self {
        Self {
            watch: true,
            interval,
        }
    }
}

/// What keeps a watched binding fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
    Timer(Duration),
    Event(EventKind),
}

struct Binding<D> {
    id: BindingId,
    descriptor: D,
    options: BindOptions,
    driver: Option<JoinHandle<()>>,
    listener: Option<Subscription>,
}

/// Binds one consumer to one resource at a time.
///
/// Must be bound from within a Tokio runtime; otherwise the binding fails
/// with [`SyncError::CollaboratorUnavailable`] recorded in state.
pub struct SubscriptionController<F: Fetch> {
    executor: FetchExecutor<F>,
    events: Option<Arc<dyn EventSource>>,
    cell: Arc<StateCell<F::Value>>,
    binding: Option<Binding<F::Descriptor>>,
}

impl<F: Fetch> SubscriptionController<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            executor: FetchExecutor::new(fetcher),
            events: None,
            cell: Arc::new(StateCell::new()),
            binding: None,
        }
    }

    /// Use `events` for resources that name a natural invalidation event.
    pub fn with_events(mut self, events: Arc<dyn EventSource>) -> Self {
        self.events = Some(events);
        self
    }

    /// Bind to `descriptor`, or go inactive with `None`.
    ///
    /// Binding the same descriptor with the same options again is a no-op.
    pub fn bind(
        &mut self,
        descriptor: Option<F::Descriptor>,
        options: BindOptions,
    ) -> StateReceiver<F::Value> {
        if let (Some(current), Some(next)) = (&self.binding, &descriptor) {
            if current.descriptor == *next && current.options == options {
                return self.cell.subscribe();
            }
        }

        self.teardown();

        match descriptor {
            Some(descriptor) => self.start(descriptor, options),
            None => self.cell.reset(),
        }
        self.cell.subscribe()
    }

    /// Tear down the current binding. Idempotent.
    ///
    /// When this returns, no in-flight fetch can change the state.
    pub fn unbind(&mut self) {
        self.teardown();
    }

    /// Re-issue a fetch under the current binding.
    ///
    /// Returns false when nothing is bound.
    pub fn refetch(&self) -> bool {
        match &self.binding {
            Some(binding) => match Handle::try_current() {
                Ok(handle) => issue(
                    &handle,
                    &self.executor,
                    &self.cell,
                    binding.id,
                    &binding.descriptor,
                ),
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ObservableState<F::Value> {
        self.cell.snapshot()
    }

    /// New observer of the state.
    pub fn subscribe(&self) -> StateReceiver<F::Value> {
        self.cell.subscribe()
    }

    /// Whether a binding is live.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Descriptor of the live binding.
    pub fn descriptor(&self) -> Option<&F::Descriptor> {
        self.binding.as_ref().map(|b| &b.descriptor)
    }

    /// The invalidation source a watched binding would use.
    pub fn invalidation(&self, options: &BindOptions) -> Option<InvalidationKind> {
        if !options.watch {
            return None;
        }
        match (self.executor.fetcher().invalidated_by(), &self.events) {
            (Some(kind), Some(_)) => Some(InvalidationKind::Event(kind)),
            _ => Some(InvalidationKind::Timer(options.interval)),
        }
    }

    fn start(&mut self, descriptor: F::Descriptor, options: BindOptions) {
        let resource = self.executor.fetcher().name();
        let id = self.cell.activate();

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.cell.reject(
                    id,
                    SyncError::CollaboratorUnavailable("no async runtime".to_string()),
                );
                self.cell.deactivate(id);
                return;
            }
        };

        let invalidation = self.invalidation(&options);
        if invalidation == Some(InvalidationKind::Timer(Duration::ZERO)) {
            tracing::warn!(resource, "Refusing to poll with a zero interval");
            self.cell
                .reject(id, SyncError::MissingParameters("interval".to_string()));
            self.cell.deactivate(id);
            return;
        }

        tracing::debug!(
            resource,
            binding = id.0,
            descriptor = ?descriptor,
            watch = options.watch,
            "Binding resource"
        );

        let mut binding = Binding {
            id,
            descriptor,
            options,
            driver: None,
            listener: None,
        };

        issue(&handle, &self.executor, &self.cell, id, &binding.descriptor);

        match invalidation {
            None => {}
            Some(InvalidationKind::Timer(period)) => {
                binding.driver = Some(handle.spawn(poll_driver(
                    self.executor.clone(),
                    Arc::clone(&self.cell),
                    id,
                    binding.descriptor.clone(),
                    period,
                )));
            }
            Some(InvalidationKind::Event(kind)) => {
                let (nudge_tx, nudge_rx) = mpsc::unbounded_channel();
                let handler: EventHandler = Arc::new(move |event: &ChainEvent| {
                    metrics::record_listener_event(event.kind().as_str());
                    let _ = nudge_tx.send(());
                });

                let subscribed = match &self.events {
                    Some(events) => events.subscribe(kind, handler),
                    None => Err(SyncError::CollaboratorUnavailable(
                        "no event source".to_string(),
                    )),
                };

                match subscribed {
                    Ok(listener) => {
                        binding.listener = Some(listener);
                        binding.driver = Some(handle.spawn(event_driver(
                            self.executor.clone(),
                            Arc::clone(&self.cell),
                            id,
                            binding.descriptor.clone(),
                            nudge_rx,
                        )));
                    }
                    Err(e) => {
                        tracing::warn!(
                            resource,
                            event = %kind,
                            error = %e,
                            "Failed to register invalidation listener"
                        );
                        self.cell.reject(id, e);
                        self.cell.deactivate(id);
                        return;
                    }
                }
            }
        }

        metrics::record_binding_started();
        self.binding = Some(binding);
    }

    fn teardown(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };

        self.cell.deactivate(binding.id);
        if let Some(driver) = binding.driver {
            driver.abort();
        }
        if let Some(listener) = binding.listener {
            listener.release();
        }

        metrics::record_binding_stopped();
        tracing::debug!(
            resource = self.executor.fetcher().name(),
            binding = binding.id.0,
            "Binding torn down"
        );
    }
}

impl<F: Fetch> Drop for SubscriptionController<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Tag and spawn one fetch for `id`. False if the binding is gone.
fn issue<F: Fetch>(
    handle: &Handle,
    executor: &FetchExecutor<F>,
    cell: &Arc<StateCell<F::Value>>,
    id: BindingId,
    descriptor: &F::Descriptor,
) -> bool {
    let Some(generation) = cell.begin(id) else {
        return false;
    };

    let resource = executor.fetcher().name();
    let fetch = executor.execute(descriptor.clone(), generation);
    let cell = Arc::clone(cell);
    handle.spawn(async move {
        let outcome = fetch.await;
        let disposition = cell.settle(outcome);
        metrics::record_outcome(resource, disposition.label());
        if !disposition.is_applied() {
            tracing::debug!(
                resource,
                generation = generation.0,
                "Discarded stale fetch result"
            );
        }
    });
    true
}

async fn poll_driver<F: Fetch>(
    executor: FetchExecutor<F>,
    cell: Arc<StateCell<F::Value>>,
    id: BindingId,
    descriptor: F::Descriptor,
    period: Duration,
) {
    let handle = Handle::current();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !issue(&handle, &executor, &cell, id, &descriptor) {
            break;
        }
    }
}

async fn event_driver<F: Fetch>(
    executor: FetchExecutor<F>,
    cell: Arc<StateCell<F::Value>>,
    id: BindingId,
    descriptor: F::Descriptor,
    mut nudges: mpsc::UnboundedReceiver<()>,
) {
    let handle = Handle::current();

    while nudges.recv().await.is_some() {
        // Collapse a burst of events into one fetch.
        while nudges.try_recv().is_ok() {}
        if !issue(&handle, &executor, &cell, id, &descriptor) {
            break;
        }
    }
}
