//! Observable state, generations, and the cell that owns them.
//!
//! # Invariants
//! - Generation only moves forward, per cell.
//! - The generation check and the state write happen under one lock, so once
//!   [`StateCell::deactivate`] returns no outcome can touch the state.
//! - Only the binding id the cell currently considers active may issue new
//!   fetches.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::sync::error::SyncError;
use crate::sync::reducer::{self, Disposition, Outcome};

/// Tag carried by every issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one live binding within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub u64);

/// Loading/error/data triple handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<SyncError>,
}

impl<T> Default for ObservableState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> ObservableState<T> {
    /// True once a fetch has produced either data or an error and nothing is
    /// loading.
    pub fn is_settled(&self) -> bool {
        !self.is_loading && (self.data.is_some() || self.error.is_some())
    }
}

/// Receiver side of a cell.
pub type StateReceiver<T> = watch::Receiver<ObservableState<T>>;

struct CellInner {
    generation: Generation,
    next_binding: u64,
    active: Option<BindingId>,
}

/// Single authority over one [`ObservableState`].
pub struct StateCell<T> {
    inner: Mutex<CellInner>,
    tx: watch::Sender<ObservableState<T>>,
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ObservableState::default());
        Self {
            inner: Mutex::new(CellInner {
                generation: Generation(0),
                next_binding: 0,
                active: None,
            }),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CellInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new binding. Any previous binding stops being active.
    pub fn activate(&self) -> BindingId {
        let mut inner = self.lock();
        inner.next_binding += 1;
        inner.generation = inner.generation.next();
        let id = BindingId(inner.next_binding);
        inner.active = Some(id);
        id
    }

    /// Tear down `id`: bumps the generation past anything in flight.
    ///
    /// Returns false if `id` was not the active binding.
    pub fn deactivate(&self, id: BindingId) -> bool {
        let mut inner = self.lock();
        if inner.active != Some(id) {
            return false;
        }
        inner.active = None;
        inner.generation = inner.generation.next();
        true
    }

    /// Whether `id` is still the active binding.
    pub fn is_active(&self, id: BindingId) -> bool {
        self.lock().active == Some(id)
    }

    /// Tag a new fetch for `id` and pre-apply the loading state.
    ///
    /// Returns `None` if the binding has been torn down.
    pub fn begin(&self, id: BindingId) -> Option<Generation> {
        let mut inner = self.lock();
        if inner.active != Some(id) {
            return None;
        }
        inner.generation = inner.generation.next();
        self.tx.send_if_modified(reducer::begin_loading);
        Some(inner.generation)
    }

    /// Record an error for `id` without issuing a fetch.
    ///
    /// Used for requests rejected before anything was attempted. Supersedes
    /// whatever is in flight.
    pub fn reject(&self, id: BindingId, error: SyncError) -> Option<Generation> {
        let mut inner = self.lock();
        if inner.active != Some(id) {
            return None;
        }
        inner.generation = inner.generation.next();
        let outcome = Outcome {
            generation: inner.generation,
            result: Err(error),
        };
        let current = inner.generation;
        self.tx
            .send_if_modified(|state| reducer::apply(state, outcome, current).is_applied());
        Some(current)
    }

    /// Apply a finished fetch. Stale outcomes are dropped.
    pub fn settle(&self, outcome: Outcome<T>) -> Disposition {
        let inner = self.lock();
        let current = inner.generation;
        let mut disposition = Disposition::Stale;
        self.tx.send_if_modified(|state| {
            disposition = reducer::apply(state, outcome, current);
            disposition.is_applied()
        });
        disposition
    }

    /// Back to idle while keeping `id` active. Anything in flight is
    /// discarded.
    pub fn clear(&self, id: BindingId) -> bool {
        let mut inner = self.lock();
        if inner.active != Some(id) {
            return false;
        }
        inner.generation = inner.generation.next();
        self.tx.send_replace(ObservableState::default());
        true
    }

    /// Back to idle. Only for a cell with no active binding.
    pub fn reset(&self) {
        let inner = self.lock();
        if inner.active.is_none() {
            self.tx.send_if_modified(|state| {
                let changed = state.data.is_some() || state.is_loading || state.error.is_some();
                *state = ObservableState::default();
                changed
            });
        }
    }

    /// Current generation.
    pub fn generation(&self) -> Generation {
        self.lock().generation
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> ObservableState<T> {
        self.tx.borrow().clone()
    }

    /// New observer.
    pub fn subscribe(&self) -> StateReceiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until `rx` holds a settled state and return it.
///
/// If the cell goes away first, the last observed state is returned.
pub async fn wait_settled<T: Clone>(rx: &mut StateReceiver<T>) -> ObservableState<T> {
    let settled = rx
        .wait_for(|state| state.is_settled())
        .await
        .map(|state| state.clone());
    match settled {
        Ok(state) => state,
        Err(_) => rx.borrow().clone(),
    }
}
