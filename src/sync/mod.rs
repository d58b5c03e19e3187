//! Reactive external-resource synchronization engine.
//!
//! # Data Flow
//! ```text
//! descriptor change
//!     → controller.rs (tear down old binding, start new one)
//!     → executor.rs (tagged fetch against the collaborator)
//!     → state.rs / reducer.rs (apply only if the tag is current)
//!     → observers (tokio watch channel)
//!
//! Invalidation (timer tick or collaborator event):
//!     → controller.rs re-issues under the same binding, new generation
//!
//! Imperative actions (send, approve, write):
//!     → action.rs (own state cell, same tag-and-discard rule)
//! ```
//!
//! # Design Decisions
//! - Generic over the descriptor and the read capability; each concrete
//!   resource only supplies a [`Fetch`] implementation
//! - Collaborators (event sources, identity) are injected explicitly
//! - There is no cancellation of an in-flight call, only discarding of its
//!   result
//! - Read-path errors never leave the binding; they land in `state.error`

pub mod action;
pub mod controller;
pub mod error;
pub mod executor;
pub mod reducer;
pub mod source;
pub mod state;

pub use action::{ActionController, Invoke};
pub use controller::{BindOptions, InvalidationKind, SubscriptionController};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use executor::{Fetch, FetchExecutor};
pub use reducer::{Disposition, Outcome};
pub use source::{
    ChainEvent, EventHandler, EventKind, EventSource, Identity, IdentitySource, Subscription,
};
pub use state::{wait_settled, Generation, ObservableState, StateCell, StateReceiver};
