//! Resource daemon: keeps a configured set of resources synchronized.
//!
//! # Data Flow
//! ```text
//! SyncConfig.resources
//!     → describe.rs (config + identity → typed descriptor)
//!     → registry.rs (one SubscriptionController per resource)
//!     → service.rs (reload / identity change → re-apply by value)
//! ```

pub mod describe;
pub mod registry;
pub mod service;

pub use describe::Scope;
pub use registry::{Registry, Tracked};
pub use service::Daemon;
