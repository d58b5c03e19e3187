//! Named resource bindings built from configuration.
//!
//! # Responsibilities
//! - Build one [`SubscriptionController`] per configured resource
//! - Re-apply configuration and identity by value: equal descriptors keep
//!   their binding, changed ones restart, removed ones are unbound
//! - Log state transitions and render snapshots

use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::blockchain::resources::{
    Account, Allowance, BlockNumber, BlockTimestamp, ChainInfo, ChainReader, ContractLogs,
    ContractRead, ContractReads, GasPrice, NativeBalance, TransactionLookup, TransactionStatus,
};
use crate::config::{BindDefaults, ResourceConfig, ResourceKind, SyncConfig};
use crate::daemon::describe::{self, DescriptorBuilder, Scope};
use crate::sync::{
    wait_settled, BindOptions, EventSource, Fetch, IdentitySource, ObservableState,
    StateReceiver, SubscriptionController, SyncError,
};

/// One named resource, type-erased.
pub trait Tracked: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ResourceKind;
    /// Rebuild the descriptor and rebind if it changed.
    fn apply(&mut self, config: &ResourceConfig, defaults: &BindDefaults, scope: &Scope);
    fn refetch(&self) -> bool;
    fn unbind(&mut self);
    fn is_bound(&self) -> bool;
    fn snapshot(&self) -> serde_json::Result<serde_json::Value>;
    /// Resolves once the current state is settled.
    fn settled(&self) -> BoxFuture<'static, ()>;
}

#[derive(Serialize)]
struct ResourceSnapshot<'a, T> {
    name: &'a str,
    kind: ResourceKind,
    state: ObservableState<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unresolved: Option<&'a SyncError>,
}

struct Resource<F: Fetch> {
    name: String,
    kind: ResourceKind,
    controller: SubscriptionController<F>,
    build: DescriptorBuilder<F::Descriptor>,
    /// Why no descriptor could be built, if that is the case.
    unresolved: Option<SyncError>,
    logger: Option<JoinHandle<()>>,
}

impl<F> Resource<F>
where
    F: Fetch,
    F::Value: Serialize,
{
    fn new(
        config: &ResourceConfig,
        fetcher: F,
        build: DescriptorBuilder<F::Descriptor>,
        events: Option<Arc<dyn EventSource>>,
    ) -> Self {
        let mut controller = SubscriptionController::new(Arc::new(fetcher));
        if let Some(events) = events {
            controller = controller.with_events(events);
        }
        let logger = Handle::try_current().ok().map(|handle| {
            handle.spawn(log_transitions(config.name.clone(), controller.subscribe()))
        });
        Self {
            name: config.name.clone(),
            kind: config.kind,
            controller,
            build,
            unresolved: None,
            logger,
        }
    }
}

impl<F> Tracked for Resource<F>
where
    F: Fetch,
    F::Value: Serialize,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn apply(&mut self, config: &ResourceConfig, defaults: &BindDefaults, scope: &Scope) {
        let options = BindOptions {
            watch: config.watch_or(defaults),
            interval: Duration::from_millis(config.interval_or(defaults)),
        };
        match (self.build)(config, scope) {
            Ok(descriptor) => {
                self.unresolved = None;
                self.controller.bind(Some(descriptor), options);
            }
            Err(e) => {
                tracing::warn!(resource = %self.name, error = %e, "Resource left unbound");
                self.unresolved = Some(e);
                self.controller.bind(None, options);
            }
        }
    }

    fn refetch(&self) -> bool {
        self.controller.refetch()
    }

    fn unbind(&mut self) {
        self.controller.unbind();
    }

    fn is_bound(&self) -> bool {
        self.controller.is_bound()
    }

    fn snapshot(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(ResourceSnapshot {
            name: &self.name,
            kind: self.kind,
            state: self.controller.state(),
            unresolved: self.unresolved.as_ref(),
        })
    }

    fn settled(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.controller.subscribe();
        Box::pin(async move {
            wait_settled(&mut rx).await;
        })
    }
}

impl<F: Fetch> Drop for Resource<F> {
    fn drop(&mut self) {
        if let Some(logger) = self.logger.take() {
            logger.abort();
        }
    }
}

async fn log_transitions<T: Clone>(name: String, mut rx: StateReceiver<T>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        match &state.error {
            Some(e) if !state.is_loading => {
                tracing::warn!(
                    resource = %name,
                    error = %e,
                    has_data = state.data.is_some(),
                    "Resource error"
                );
            }
            _ => {
                tracing::debug!(
                    resource = %name,
                    is_loading = state.is_loading,
                    has_data = state.data.is_some(),
                    "Resource state changed"
                );
            }
        }
    }
}

/// All configured resources, in configuration order.
pub struct Registry {
    reader: ChainReader,
    identity: Arc<dyn IdentitySource>,
    events: Option<Arc<dyn EventSource>>,
    config: SyncConfig,
    resources: Vec<Box<dyn Tracked>>,
}

impl Registry {
    pub fn new(
        reader: ChainReader,
        identity: Arc<dyn IdentitySource>,
        events: Option<Arc<dyn EventSource>>,
    ) -> Self {
        Self {
            reader,
            identity,
            events,
            config: SyncConfig::default(),
            resources: Vec::new(),
        }
    }

    /// Reconcile bindings with `config`.
    pub fn apply(&mut self, config: &SyncConfig) {
        let mut previous = std::mem::take(&mut self.resources);
        let scope = self.scope(config);

        for resource_config in &config.resources {
            let kept = previous
                .iter()
                .position(|r| {
                    r.name() == resource_config.name && r.kind() == resource_config.kind
                })
                .map(|i| previous.swap_remove(i));
            let mut resource = kept.unwrap_or_else(|| self.track(resource_config));
            resource.apply(resource_config, &config.defaults, &scope);
            self.resources.push(resource);
        }

        for mut removed in previous {
            tracing::info!(resource = removed.name(), "Resource removed");
            removed.unbind();
        }

        self.config = config.clone();
        tracing::info!(resources = self.resources.len(), "Resources applied");
    }

    /// Re-apply the last configuration under the current identity.
    pub fn refresh_identity(&mut self) {
        let config = self.config.clone();
        let scope = self.scope(&config);
        for (resource, resource_config) in self.resources.iter_mut().zip(&config.resources) {
            resource.apply(resource_config, &config.defaults, &scope);
        }
    }

    /// Re-issue a fetch on every bound resource.
    pub fn refetch_all(&self) -> usize {
        self.resources.iter().filter(|r| r.refetch()).count()
    }

    pub fn unbind_all(&mut self) {
        for resource in &mut self.resources {
            resource.unbind();
        }
    }

    /// Wait until every bound resource has settled, up to `limit`.
    ///
    /// Returns false on timeout.
    pub async fn settle_all(&self, limit: Duration) -> bool {
        let pending: Vec<_> = self
            .resources
            .iter()
            .filter(|r| r.is_bound())
            .map(|r| r.settled())
            .collect();
        tokio::time::timeout(limit, join_all(pending)).await.is_ok()
    }

    /// Current state of every resource.
    pub fn snapshot(&self) -> serde_json::Result<serde_json::Value> {
        self.resources
            .iter()
            .map(|r| r.snapshot())
            .collect::<serde_json::Result<Vec<_>>>()
            .map(serde_json::Value::Array)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name()).collect()
    }

    fn scope(&self, config: &SyncConfig) -> Scope {
        let identity = self.identity.current_identity();
        Scope {
            account: identity.account,
            chain_id: identity.chain_id.unwrap_or(config.blockchain.chain_id),
            confirmations: config.blockchain.confirmation_blocks,
        }
    }

    fn track(&self, config: &ResourceConfig) -> Box<dyn Tracked> {
        let reader = self.reader.clone();
        match config.kind {
            ResourceKind::BlockNumber => self.build(config, BlockNumber(reader), describe::chain),
            ResourceKind::Balance => self.build(config, NativeBalance(reader), describe::balance),
            ResourceKind::ChainId => self.build(config, ChainInfo(reader), describe::chain),
            ResourceKind::Account => self.build(
                config,
                Account(Arc::clone(&self.identity)),
                describe::chain,
            ),
            ResourceKind::Transaction => {
                self.build(config, TransactionLookup(reader), describe::transaction)
            }
            ResourceKind::TransactionStatus => {
                self.build(config, TransactionStatus(reader), describe::transaction_status)
            }
            ResourceKind::BlockTimestamp => {
                self.build(config, BlockTimestamp(reader), describe::block)
            }
            ResourceKind::GasPrice => self.build(config, GasPrice(reader), describe::chain),
            ResourceKind::ContractRead => self.build(config, ContractRead(reader), describe::call),
            ResourceKind::ContractReads => {
                self.build(config, ContractReads(reader), describe::calls)
            }
            ResourceKind::Allowance => self.build(config, Allowance(reader), describe::allowance),
            ResourceKind::Logs => self.build(config, ContractLogs(reader), describe::logs),
        }
    }

    fn build<F>(
        &self,
        config: &ResourceConfig,
        fetcher: F,
        build: DescriptorBuilder<F::Descriptor>,
    ) -> Box<dyn Tracked>
    where
        F: Fetch,
        F::Value: Serialize,
    {
        tracing::info!(resource = %config.name, kind = ?config.kind, "Resource added");
        Box::new(Resource::new(config, fetcher, build, self.events.clone()))
    }
}
