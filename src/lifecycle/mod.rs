//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → chain watcher stops → daemon unbinds every resource → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
