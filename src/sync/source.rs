//! Invalidation sources and the collaborator's event surface.
//!
//! # Responsibilities
//! - Name the external events a binding can listen to
//! - Hand out [`Subscription`] disposers that release exactly once
//! - Describe the identity (account, chain) descriptors are built from
//!
//! # Design Decisions
//! - Event sources are injected, never read from ambient global state
//! - A handler must not block: it only nudges the binding's driver

use alloy::primitives::Address;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::sync::error::SyncResult;

/// External events a resource can be invalidated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewBlock,
    AccountsChanged,
    ChainChanged,
}

impl EventKind {
    /// Label used for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewBlock => "new_block",
            EventKind::AccountsChanged => "accounts_changed",
            EventKind::ChainChanged => "chain_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    NewBlock(u64),
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChainEvent::NewBlock(_) => EventKind::NewBlock,
            ChainEvent::AccountsChanged(_) => EventKind::AccountsChanged,
            ChainEvent::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// Callback registered with an [`EventSource`].
pub type EventHandler = Arc<dyn Fn(&ChainEvent) + Send + Sync>;

/// Disposer returned by [`EventSource::subscribe`].
///
/// The release closure runs exactly once: on [`Subscription::release`] or on
/// drop, whichever comes first.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release now.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Anything that can deliver [`ChainEvent`]s to registered handlers.
pub trait EventSource: Send + Sync {
    /// Register `handler` for events of `kind`.
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SyncResult<Subscription>;
}

/// The active account and network, as seen by the collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

/// Source of the current [`Identity`].
pub trait IdentitySource: Send + Sync {
    fn current_identity(&self) -> Identity;
}
