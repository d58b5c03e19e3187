//! Shared test doubles for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chain_sync::sync::{
    ChainEvent, EventHandler, EventKind, EventSource, Fetch, Subscription, SyncError, SyncResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

type Reply = oneshot::Sender<SyncResult<u64>>;

/// Fetcher whose calls block until the test resolves them, in any order.
pub struct GatedFetcher {
    calls: Mutex<Vec<(u32, Option<Reply>)>>,
    arrived: Notify,
}

impl GatedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            arrived: Notify::new(),
        })
    }

    /// Number of fetches issued so far.
    pub fn issued(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Descriptor of call `index`.
    pub fn descriptor(&self, index: usize) -> u32 {
        self.calls.lock().unwrap()[index].0
    }

    /// Wait until at least `count` fetches have been issued.
    pub async fn wait_issued(&self, count: usize) {
        loop {
            let arrived = self.arrived.notified();
            if self.issued() >= count {
                return;
            }
            arrived.await;
        }
    }

    /// Complete call `index` with `result`.
    pub fn resolve(&self, index: usize, result: SyncResult<u64>) {
        let reply = self.calls.lock().unwrap()[index]
            .1
            .take()
            .expect("call already resolved");
        let _ = reply.send(result);
    }
}

#[async_trait]
impl Fetch for GatedFetcher {
    type Descriptor = u32;
    type Value = u64;

    fn name(&self) -> &'static str {
        "gated"
    }

    async fn fetch(&self, descriptor: &u32) -> SyncResult<u64> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push((*descriptor, Some(tx)));
        self.arrived.notify_waiters();
        rx.await
            .unwrap_or_else(|_| Err(SyncError::RemoteFailure("gate dropped".to_string())))
    }
}

/// Fetcher that replays a script of (latency, result) steps.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<(Duration, SyncResult<u64>)>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<(Duration, SyncResult<u64>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    type Descriptor = u32;
    type Value = u64;

    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, _descriptor: &u32) -> SyncResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some((latency, result)) => {
                tokio::time::sleep(latency).await;
                result
            }
            None => Err(SyncError::RemoteFailure("script exhausted".to_string())),
        }
    }
}

/// Fetcher that answers immediately with its descriptor and is invalidated
/// by new blocks.
#[derive(Default)]
pub struct EchoFetcher {
    calls: AtomicUsize,
}

impl EchoFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for EchoFetcher {
    type Descriptor = u32;
    type Value = u64;

    fn name(&self) -> &'static str {
        "echo"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, descriptor: &u32) -> SyncResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(u64::from(*descriptor))
    }
}

/// Event source that counts registrations and releases.
#[derive(Default)]
pub struct CountingEvents {
    handlers: Arc<Mutex<HashMap<u64, (EventKind, EventHandler)>>>,
    next_id: AtomicU64,
    registered: AtomicUsize,
    released: Arc<AtomicUsize>,
    fail_next: AtomicBool,
}

impl CountingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Registrations not yet released.
    pub fn active(&self) -> usize {
        self.registered() - self.released()
    }

    /// Make the next `subscribe` call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fire(&self, event: ChainEvent) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .unwrap()
            .values()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(&event);
        }
    }
}

impl EventSource for CountingEvents {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SyncResult<Subscription> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SyncError::CollaboratorUnavailable(
                "listener rejected".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().insert(id, (kind, handler));
        self.registered.fetch_add(1, Ordering::SeqCst);

        let handlers = self.handlers.clone();
        let released = self.released.clone();
        Ok(Subscription::new(move || {
            handlers.lock().unwrap().remove(&id);
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Let spawned tasks run to quiescence on a current-thread runtime.
pub async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
