//! Fetch executor.
//!
//! # Responsibilities
//! - Define the read capability a resource supplies ([`Fetch`])
//! - Run one read and tag its result with the issuing generation
//!
//! # Design Decisions
//! - The executor never touches state; it returns an [`Outcome`]
//! - No timeout here: timeout policy belongs to the collaborator
//! - A read is never cancelled. Once issued it runs to completion and its
//!   result may simply be discarded

use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;
use crate::sync::error::SyncResult;
use crate::sync::reducer::Outcome;
use crate::sync::source::EventKind;
use crate::sync::state::Generation;

/// Read capability for one kind of resource.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    /// Identifies what to fetch. Equality drives restart decisions.
    type Descriptor: Clone + PartialEq + Debug + Send + Sync + 'static;
    /// What a successful read produces.
    type Value: Clone + Send + Sync + 'static;

    /// Name for logs and metrics.
    fn name(&self) -> &'static str;

    /// The external event that naturally invalidates this resource, if any.
    fn invalidated_by(&self) -> Option<EventKind> {
        None
    }

    /// Perform the read.
    async fn fetch(&self, descriptor: &Self::Descriptor) -> SyncResult<Self::Value>;
}

/// Runs reads for one [`Fetch`] implementation.
pub struct FetchExecutor<F: Fetch> {
    fetcher: Arc<F>,
}

impl<F: Fetch> Clone for FetchExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

impl<F: Fetch> FetchExecutor<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Build the future for one read issued under `generation`.
    ///
    /// The future owns everything it needs and can outlive the binding.
    pub fn execute(
        &self,
        descriptor: F::Descriptor,
        generation: Generation,
    ) -> impl Future<Output = Outcome<F::Value>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        async move {
            let resource = fetcher.name();
            let started = Instant::now();
            metrics::record_fetch(resource);

            let result = fetcher.fetch(&descriptor).await;

            match &result {
                Ok(_) => tracing::debug!(
                    resource,
                    generation = generation.0,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Fetch completed"
                ),
                Err(e) => tracing::warn!(
                    resource,
                    generation = generation.0,
                    descriptor = ?descriptor,
                    error = %e,
                    "Fetch failed"
                ),
            }

            Outcome { generation, result }
        }
    }
}
