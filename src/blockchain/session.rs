//! Active account and network.

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::blockchain::events::ChainEvents;
use crate::sync::{ChainEvent, Identity, IdentitySource};

/// Current identity, readable lock-free from any task.
///
/// Changes are published on the event hub so bindings scoped to the old
/// account or chain can re-bind.
pub struct Session {
    identity: ArcSwap<Identity>,
    events: Arc<ChainEvents>,
}

impl Session {
    pub fn new(events: Arc<ChainEvents>) -> Self {
        Self {
            identity: ArcSwap::from_pointee(Identity::default()),
            events,
        }
    }

    /// Set the active account. Returns true if it changed.
    pub fn set_account(&self, account: Option<Address>) -> bool {
        let previous = self.identity.rcu(|current| Identity {
            account,
            ..**current
        });
        if previous.account == account {
            return false;
        }
        tracing::info!(account = ?account, "Active account changed");
        self.events
            .publish(ChainEvent::AccountsChanged(account.into_iter().collect()));
        true
    }

    /// Set the connected chain. Returns true if it changed.
    pub fn set_chain_id(&self, chain_id: u64) -> bool {
        let previous = self.identity.rcu(|current| Identity {
            chain_id: Some(chain_id),
            ..**current
        });
        if previous.chain_id == Some(chain_id) {
            return false;
        }
        tracing::info!(chain_id, "Connected chain changed");
        self.events.publish(ChainEvent::ChainChanged(chain_id));
        true
    }

    pub fn account(&self) -> Option<Address> {
        self.identity.load().account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.identity.load().chain_id
    }
}

impl IdentitySource for Session {
    fn current_identity(&self) -> Identity {
        **self.identity.load()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.current_identity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{EventKind, EventSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_changes_publish_once() {
        let events = Arc::new(ChainEvents::new());
        let session = Session::new(Arc::clone(&events));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = events
            .subscribe(
                EventKind::AccountsChanged,
                Arc::new(move |event: &ChainEvent| sink.lock().unwrap().push(event.clone())),
            )
            .unwrap();

        let account = Address::repeat_byte(0x11);
        assert!(session.set_account(Some(account)));
        assert!(!session.set_account(Some(account)));
        assert!(session.set_account(None));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ChainEvent::AccountsChanged(vec![account]),
                ChainEvent::AccountsChanged(Vec::new()),
            ]
        );
    }

    #[test]
    fn test_chain_change() {
        let events = Arc::new(ChainEvents::new());
        let session = Session::new(Arc::clone(&events));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = events
            .subscribe(
                EventKind::ChainChanged,
                Arc::new(move |_: &ChainEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(session.set_chain_id(1));
        assert!(!session.set_chain_id(1));
        assert_eq!(session.current_identity().chain_id, Some(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
