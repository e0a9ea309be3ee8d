//! # Chain Connectivity
//!
//! Tracks which account a wallet session is using and which chain it is
//! on, and tells interested parties when either changes.
//!
//! Observers can either register a callback ([`ChainConnectivity::register`],
//! removed again with [`ChainConnectivity::unregister`]) or take a tokio
//! broadcast receiver ([`ChainConnectivity::subscribe`]). Both see the same
//! events in the same order.
//!
//! Nothing in the Merkle engine depends on this module.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::{chain_name, BSC_TESTNET_CHAIN_ID};
use crate::types::Address;

/// Buffered events per broadcast subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Handle returned by [`ChainConnectivity::register`].
pub type ObserverId = u64;

type Callback = Arc<dyn Fn(&ConnectivityEvent) + Send + Sync>;

/// A change in the wallet session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectivityEvent {
    /// The active account changed. `None` means the wallet exposes no account.
    AccountChanged { account: Option<Address> },
    /// The wallet switched chains.
    ChainChanged {
        chain_id: u64,
        on_expected_chain: bool,
    },
    /// The session ended.
    Disconnected,
}

/// Snapshot of the current session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

/// Observer hub for account and chain changes.
pub struct ChainConnectivity {
    expected_chain_id: u64,
    session: RwLock<Session>,
    observers: Mutex<BTreeMap<ObserverId, Callback>>,
    next_id: AtomicU64,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ChainConnectivity {
    pub fn new(expected_chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            expected_chain_id,
            session: RwLock::new(Session::default()),
            observers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    /// Add a callback. It runs synchronously for every later event.
    pub fn register<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&ConnectivityEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().insert(id, Arc::new(callback));
        id
    }

    /// Remove a callback. Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        self.observers.lock().remove(&id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> Session {
        *self.session.read()
    }

    pub fn is_connected(&self) -> bool {
        self.session.read().account.is_some()
    }

    pub fn is_on_expected_chain(&self) -> bool {
        self.session.read().chain_id == Some(self.expected_chain_id)
    }

    /// The wallet reported its account list. The first entry is the active
    /// account; an empty list means no account is exposed.
    pub fn accounts_changed(&self, accounts: &[Address]) {
        let account = accounts.first().copied();
        {
            let mut session = self.session.write();
            if session.account == account {
                return;
            }
            session.account = account;
        }
        self.emit(ConnectivityEvent::AccountChanged { account });
    }

    /// The wallet reported a chain switch.
    pub fn chain_changed(&self, chain_id: u64) {
        {
            let mut session = self.session.write();
            if session.chain_id == Some(chain_id) {
                return;
            }
            session.chain_id = Some(chain_id);
        }
        let on_expected_chain = chain_id == self.expected_chain_id;
        if !on_expected_chain {
            tracing::warn!(
                chain_id,
                expected = self.expected_chain_id,
                "wallet is on {} instead of {}",
                chain_name(chain_id),
                chain_name(self.expected_chain_id)
            );
        }
        self.emit(ConnectivityEvent::ChainChanged {
            chain_id,
            on_expected_chain,
        });
    }

    /// Forget the session entirely.
    pub fn disconnect(&self) {
        {
            let mut session = self.session.write();
            if *session == Session::default() {
                return;
            }
            *session = Session::default();
        }
        self.emit(ConnectivityEvent::Disconnected);
    }

    fn emit(&self, event: ConnectivityEvent) {
        // Callbacks run outside the lock so they may register or unregister.
        let callbacks: Vec<Callback> = self.observers.lock().values().cloned().collect();
        for callback in callbacks {
            callback(&event);
        }
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for ChainConnectivity {
    fn default() -> Self {
        Self::new(BSC_TESTNET_CHAIN_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn test_account_tracking() {
        let hub = ChainConnectivity::default();
        assert!(!hub.is_connected());

        hub.accounts_changed(&[addr(1), addr(2)]);
        assert_eq!(hub.session().account, Some(addr(1)));
        assert!(hub.is_connected());

        hub.accounts_changed(&[]);
        assert!(!hub.is_connected());
    }

    #[test]
    fn test_expected_chain() {
        let hub = ChainConnectivity::default();
        assert_eq!(hub.expected_chain_id(), 97);
        assert!(!hub.is_on_expected_chain());
        hub.chain_changed(56);
        assert!(!hub.is_on_expected_chain());
        hub.chain_changed(97);
        assert!(hub.is_on_expected_chain());
    }

    #[test]
    fn test_callbacks_register_and_unregister() {
        let hub = ChainConnectivity::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let id = hub.register(move |event| sink.lock().push(event.clone()));
        assert_eq!(hub.observer_count(), 1);

        hub.accounts_changed(&[addr(1)]);
        hub.chain_changed(97);
        assert_eq!(
            *seen.lock(),
            vec![
                ConnectivityEvent::AccountChanged {
                    account: Some(addr(1))
                },
                ConnectivityEvent::ChainChanged {
                    chain_id: 97,
                    on_expected_chain: true
                },
            ]
        );

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        hub.disconnect();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_repeated_values_do_not_emit() {
        let hub = ChainConnectivity::default();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        hub.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        hub.accounts_changed(&[addr(3)]);
        hub.accounts_changed(&[addr(3), addr(4)]);
        hub.chain_changed(97);
        hub.chain_changed(97);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let hub = Arc::new(ChainConnectivity::default());
        let weak = Arc::downgrade(&hub);
        let id = Arc::new(AtomicU64::new(0));
        let own_id = id.clone();
        let registered = hub.register(move |_| {
            if let Some(hub) = weak.upgrade() {
                hub.unregister(own_id.load(Ordering::SeqCst));
            }
        });
        id.store(registered, Ordering::SeqCst);

        hub.chain_changed(1);
        assert_eq!(hub.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_subscribers_see_events() {
        let hub = ChainConnectivity::default();
        let mut rx = hub.subscribe();

        hub.chain_changed(56);
        hub.accounts_changed(&[addr(7)]);
        hub.disconnect();

        assert_eq!(
            rx.recv().await.unwrap(),
            ConnectivityEvent::ChainChanged {
                chain_id: 56,
                on_expected_chain: false
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            ConnectivityEvent::AccountChanged { .. }
        ));
        assert_eq!(rx.recv().await.unwrap(), ConnectivityEvent::Disconnected);
        assert_eq!(hub.session(), Session::default());
    }
}
