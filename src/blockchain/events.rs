//! Chain event hub and the watcher that feeds it.
//!
//! # Data Flow
//! ```text
//! ChainWatcher (polls eth_blockNumber / eth_chainId)
//!     → ChainEvents::publish
//!     → registered handlers (controller drivers, daemon)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::session::Session;
use crate::blockchain::types::BlockchainResult;
use crate::config::WatcherConfig;
use crate::observability::metrics;
use crate::resilience::calculate_backoff;
use crate::sync::{ChainEvent, EventHandler, EventKind, EventSource, Subscription, SyncResult};

type Listeners = HashMap<u64, (EventKind, EventHandler)>;

/// In-process event hub.
///
/// Handlers run synchronously on the publishing task and must not block.
#[derive(Default)]
pub struct ChainEvents {
    listeners: Arc<Mutex<Listeners>>,
    next_id: AtomicU64,
}

impl ChainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler registered for its kind.
    pub fn publish(&self, event: ChainEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        metrics::record_listener_event(kind.as_str());
        tracing::trace!(event = %kind, listeners = handlers.len(), "Publishing chain event");

        for handler in handlers {
            handler(&event);
        }
    }

    /// Number of live registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventSource for ChainEvents {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SyncResult<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (kind, handler));

        let listeners = Arc::clone(&self.listeners);
        Ok(Subscription::new(move || {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        }))
    }
}

impl std::fmt::Debug for ChainEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Polls the chain head and network, publishing changes.
pub struct ChainWatcher {
    client: BlockchainClient,
    events: Arc<ChainEvents>,
    session: Arc<Session>,
    config: WatcherConfig,
    last_block: Option<u64>,
}

impl ChainWatcher {
    pub fn new(
        client: BlockchainClient,
        events: Arc<ChainEvents>,
        session: Arc<Session>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            client,
            events,
            session,
            config,
            last_block: None,
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!(
            block_poll_ms = self.config.block_poll_ms,
            chain_poll_ms = self.config.chain_poll_ms,
            "Starting chain watcher"
        );

        let chain_every = Duration::from_millis(self.config.chain_poll_ms);
        let mut next_chain_check = Instant::now();
        let mut failures: u32 = 0;

        loop {
            let result = self.poll_head().await;
            let result = match result {
                Ok(()) if Instant::now() >= next_chain_check => {
                    next_chain_check = Instant::now() + chain_every;
                    self.poll_chain().await
                }
                other => other,
            };

            let delay = match result {
                Ok(()) => {
                    if failures > 0 {
                        tracing::info!(failures, "Chain watcher recovered");
                    }
                    failures = 0;
                    Duration::from_millis(self.config.block_poll_ms)
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = calculate_backoff(
                        failures,
                        self.config.backoff_base_ms,
                        self.config.backoff_max_ms,
                    );
                    tracing::warn!(
                        error = %e,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Chain watcher poll failed"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("Chain watcher stopped");
                    return;
                }
            }
        }
    }

    async fn poll_head(&mut self) -> BlockchainResult<()> {
        let head = self.client.get_block_number().await?;
        self.observe_head(head);
        Ok(())
    }

    async fn poll_chain(&self) -> BlockchainResult<()> {
        let chain_id = self.client.get_chain_id().await?;
        self.session.set_chain_id(chain_id.0);
        Ok(())
    }

    /// Publish a new-block event when `head` differs from the last one seen.
    fn observe_head(&mut self, head: u64) -> bool {
        if self.last_block == Some(head) {
            return false;
        }
        self.last_block = Some(head);
        self.events.publish(ChainEvent::NewBlock(head));
        true
    }
}
