//! Reactive synchronization of external chain state.
//!
//! The [`sync`] engine binds descriptors to observable state and keeps it
//! fresh; [`blockchain`] supplies the concrete resources and actions; the
//! remaining modules are the ambient daemon stack.

pub mod blockchain;
pub mod config;
pub mod daemon;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod sync;

pub use config::SyncConfig;
pub use lifecycle::Shutdown;
pub use sync::{
    ActionController, BindOptions, Fetch, Invoke, ObservableState, SubscriptionController,
    SyncError,
};
