//! Thread-safe registry of connected clients with a change-event log.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::identity::Identity;

use super::event::ClientEvent;
use super::{Client, ClientConfig};

/// Bound on the undrained event log; beyond this the oldest event is lost.
const EVENT_CAP: usize = 256;

struct ListInner {
    clients: HashMap<Identity, Arc<Client>>,
    events: VecDeque<ClientEvent>,
    watching: bool,
}

/// Registry of all connected clients.
///
/// The client map and event log live behind one lock. Iteration requires the
/// scoped guard from [`ClientList::lock`], which makes the must-lock-to-
/// iterate contract visible at the call site. Events are FIFO per registry
/// and persist until [`ClientList::clear_events`] — the scene layer drains
/// and clears them once per tick.
pub struct ClientList {
    client_config: ClientConfig,
    inner: Mutex<ListInner>,
}

impl ClientList {
    pub fn new(client_config: ClientConfig) -> Self {
        Self {
            client_config,
            inner: Mutex::new(ListInner {
                clients: HashMap::new(),
                events: VecDeque::new(),
                watching: false,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, ListInner> {
        let Ok(guard) = self.inner.lock() else {
            panic!("client list mutex poisoned; a holder panicked");
        };
        guard
    }

    fn record_event(inner: &mut ListInner, event: ClientEvent) {
        if !inner.watching {
            return;
        }
        if inner.events.len() >= EVENT_CAP {
            inner.events.pop_front();
            warn!("client event log overflow: dropped oldest event (is anything draining it?)");
        }
        inner.events.push_back(event);
    }

    /// Registers a client for this identity, or returns the existing one.
    /// A genuinely new registration records a `Connected` event.
    pub fn add(&self, identity: Identity) -> Arc<Client> {
        let mut inner = self.locked();
        if let Some(existing) = inner.clients.get(&identity) {
            return existing.clone();
        }
        let client = Arc::new(Client::new(identity, &self.client_config));
        inner.clients.insert(identity, client.clone());
        Self::record_event(&mut inner, ClientEvent::Connected(identity));
        info!("client connected: {identity}");
        client
    }

    /// Removes a client, recording a `Disconnected` event if it was present.
    pub fn remove(&self, identity: &Identity) -> Option<Arc<Client>> {
        let mut inner = self.locked();
        let removed = inner.clients.remove(identity);
        if removed.is_some() {
            Self::record_event(&mut inner, ClientEvent::Disconnected(*identity));
            info!("client disconnected: {identity}");
        }
        removed
    }

    pub fn find(&self, identity: &Identity) -> Option<Arc<Client>> {
        self.locked().clients.get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.locked().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().clients.is_empty()
    }

    /// Removes every client whose timeout clock has lapsed, recording
    /// `TimedOut` events. Returns the removed clients.
    pub fn collect_timeouts(&self) -> Vec<Arc<Client>> {
        let timeout = self.client_config.timeout;
        let mut inner = self.locked();
        let lapsed: Vec<Identity> = inner
            .clients
            .iter()
            .filter(|(_, client)| client.timed_out(timeout))
            .map(|(identity, _)| *identity)
            .collect();

        let mut removed = Vec::with_capacity(lapsed.len());
        for identity in lapsed {
            if let Some(client) = inner.clients.remove(&identity) {
                Self::record_event(&mut inner, ClientEvent::TimedOut(identity));
                info!("client timed out: {identity}");
                removed.push(client);
            }
        }
        removed
    }

    /// Acquires the scoped guard required for iteration.
    pub fn lock(&self) -> ClientListGuard<'_> {
        ClientListGuard {
            guard: self.locked(),
        }
    }

    /// Enables or disables event recording.
    pub fn watch_events(&self, enabled: bool) {
        let mut inner = self.locked();
        inner.watching = enabled;
        if !enabled {
            inner.events.clear();
        }
    }

    /// Discards drained events. Must be called once per tick by whichever
    /// consumer read them; events are never expired automatically.
    pub fn clear_events(&self) {
        self.locked().events.clear();
    }
}

/// Scoped lock handle over the registry. Holding this is the iteration
/// contract; dropping it releases the lock.
pub struct ClientListGuard<'a> {
    guard: MutexGuard<'a, ListInner>,
}

impl ClientListGuard<'_> {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Client>> {
        self.guard.clients.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &ClientEvent> {
        self.guard.events.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.clients.is_empty()
    }
}
