//! Resilience helpers for the long-running pollers.
//!
//! The engine itself imposes no timeout or retry policy; RPC timeouts live in
//! the blockchain client and the chain watcher backs off between failed polls.

pub mod backoff;

pub use backoff::calculate_backoff;
