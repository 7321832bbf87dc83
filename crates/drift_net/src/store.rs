//! Shared key-value store between viewports
//!
//! The store is the only channel between viewports. Every viewport talks to
//! it through a [`PeerStore`] handle that knows which window it writes for,
//! so change notifications can skip the writer.

use crate::error::StoreError;
use crate::WindowId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Buffered change notifications per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 4096;

/// A key was added, changed (`value` is `Some`) or removed (`None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<String>,
    pub origin: WindowId,
}

pub type SharedStore = Arc<dyn PeerStore>;

/// One viewport's view of the shared store.
pub trait PeerStore: Send + Sync {
    /// The window this handle writes as.
    fn origin(&self) -> WindowId;

    fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Option<String>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> bool;

    /// Keys starting with `prefix`, in no particular order.
    fn list(&self, prefix: &str) -> Vec<String>;

    /// Remove `key` and return its value in one step. At most one caller
    /// ever receives `Some` for a given write.
    fn try_claim(&self, key: &str) -> Option<String>;

    /// Changes made by other windows.
    fn subscribe(&self) -> StoreSubscription;
}

/// Change feed that skips the subscriber's own writes.
pub struct StoreSubscription {
    rx: broadcast::Receiver<StoreEvent>,
    me: WindowId,
}

impl StoreSubscription {
    /// Next change from another window. `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.me => continue,
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    // The periodic scan picks up whatever was missed.
                    tracing::debug!(window = %self.me, skipped, "store notifications lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.origin == self.me => continue,
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(window = %self.me, skipped, "store notifications lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[inline]
fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// In-process store shared by every viewport of one runtime.
pub struct MemoryStore {
    entries: DashMap<String, String>,
    used_bytes: AtomicUsize,
    quota_bytes: usize,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new(quota_bytes: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            quota_bytes,
            events,
        }
    }

    /// Handle for one window.
    pub fn connect(self: &Arc<Self>, window: WindowId) -> StoreHandle {
        StoreHandle {
            store: Arc::clone(self),
            origin: window,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of keys and values currently held.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Acquire)
    }

    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    fn notify(&self, key: &str, value: Option<String>, origin: WindowId) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent {
            key: key.to_owned(),
            value,
            origin,
        });
    }

    fn put_from(&self, origin: WindowId, key: &str, value: String) -> Result<(), StoreError> {
        let incoming = entry_size(key, &value);
        let previous = self
            .entries
            .get(key)
            .map(|v| entry_size(key, v.value()))
            .unwrap_or(0);

        // Reserve the new bytes up front so concurrent writers cannot both
        // squeeze under the quota.
        let mut used = self.used_bytes.load(Ordering::Acquire);
        loop {
            let projected = used.saturating_sub(previous) + incoming;
            if projected > self.quota_bytes {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_owned(),
                    requested: incoming,
                    used,
                    quota: self.quota_bytes,
                });
            }
            match self.used_bytes.compare_exchange_weak(
                used,
                used + incoming,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => used = actual,
            }
        }

        if let Some(old) = self.entries.insert(key.to_owned(), value.clone()) {
            self.used_bytes
                .fetch_sub(entry_size(key, &old), Ordering::AcqRel);
        }
        self.notify(key, Some(value), origin);
        Ok(())
    }

    fn remove_from(&self, origin: WindowId, key: &str) -> Option<String> {
        let (key, value) = self.entries.remove(key)?;
        self.used_bytes
            .fetch_sub(entry_size(&key, &value), Ordering::AcqRel);
        self.notify(&key, None, origin);
        Some(value)
    }
}

/// [`PeerStore`] over a [`MemoryStore`], writing as one window.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<MemoryStore>,
    origin: WindowId,
}

impl StoreHandle {
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl PeerStore for StoreHandle {
    fn origin(&self) -> WindowId {
        self.origin
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.store.put_from(self.origin, key, value)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.store.entries.get(key).map(|v| v.value().clone())
    }

    fn delete(&self, key: &str) -> bool {
        self.store.remove_from(self.origin, key).is_some()
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        self.store
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn try_claim(&self, key: &str) -> Option<String> {
        // DashMap::remove is atomic per key: a second claimer sees nothing.
        self.store.remove_from(self.origin, key)
    }

    fn subscribe(&self) -> StoreSubscription {
        StoreSubscription {
            rx: self.store.events.subscribe(),
            me: self.origin,
        }
    }
}
