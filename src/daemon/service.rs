//! Daemon event loop.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::config::SyncConfig;
use crate::daemon::registry::Registry;
use crate::sync::{ChainEvent, EventHandler, EventKind, EventSource, Subscription};

/// Keeps the registry in step with configuration reloads and identity
/// changes until shutdown.
pub struct Daemon {
    registry: Registry,
    events: Option<Arc<dyn EventSource>>,
}

impl Daemon {
    pub fn new(registry: Registry, events: Option<Arc<dyn EventSource>>) -> Self {
        Self { registry, events }
    }

    /// Run until `shutdown_rx` fires. Every binding is torn down before this
    /// returns; the registry is handed back for inspection.
    pub async fn run(
        mut self,
        mut config_rx: mpsc::UnboundedReceiver<SyncConfig>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Registry {
        let (identity_tx, mut identity_rx) = mpsc::unbounded_channel();
        let listeners = self.listen_identity(identity_tx);

        tracing::info!(resources = self.registry.len(), "Daemon running");

        loop {
            tokio::select! {
                Some(config) = config_rx.recv() => {
                    tracing::info!("Applying reloaded configuration");
                    self.registry.apply(&config);
                }
                Some(()) = identity_rx.recv() => {
                    // Collapse bursts into one pass.
                    while identity_rx.try_recv().is_ok() {}
                    tracing::debug!("Identity changed, re-applying resources");
                    self.registry.refresh_identity();
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        for listener in listeners {
            listener.release();
        }
        self.registry.unbind_all();
        tracing::info!("Daemon stopped");
        self.registry
    }

    fn listen_identity(&self, identity_tx: mpsc::UnboundedSender<()>) -> Vec<Subscription> {
        let Some(events) = &self.events else {
            return Vec::new();
        };
        [EventKind::AccountsChanged, EventKind::ChainChanged]
            .into_iter()
            .filter_map(|kind| {
                let tx = identity_tx.clone();
                let handler: EventHandler = Arc::new(move |_event: &ChainEvent| {
                    let _ = tx.send(());
                });
                match events.subscribe(kind, handler) {
                    Ok(listener) => Some(listener),
                    Err(e) => {
                        tracing::warn!(event = %kind, error = %e, "Identity listener not armed");
                        None
                    }
                }
            })
            .collect()
    }
}
