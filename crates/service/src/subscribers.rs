//! Observer list for published loader snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use adoption_insights_core::ServiceState;

pub(crate) type Listener<T> = Arc<dyn Fn(ServiceState<T>) + Send + Sync>;

pub(crate) struct Subscribers<T> {
    inner: Mutex<Registry<T>>,
}

struct Registry<T> {
    next_id: u64,
    listeners: Vec<Arc<Entry<T>>>,
}

/// One registered listener plus the sequence number of the last snapshot it
/// received. The slot lock is held while the listener runs, so deliveries to
/// one listener never overlap and never go backwards.
struct Entry<T> {
    id: u64,
    listener: Listener<T>,
    delivered: Mutex<Option<u64>>,
}

impl<T: Clone> Entry<T> {
    fn deliver(&self, seq: u64, snapshot: &ServiceState<T>) -> bool {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if delivered.is_some_and(|last| last >= seq) {
            return false;
        }
        *delivered = Some(seq);
        (self.listener)(snapshot.clone());
        true
    }
}

impl<T: Clone> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self { inner: Mutex::new(Registry { next_id: 0, listeners: Vec::new() }) }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add(&self, listener: Listener<T>) -> u64 {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.listeners.push(Arc::new(Entry { id, listener, delivered: Mutex::new(None) }));
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut registry = self.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|entry| entry.id != id);
        registry.listeners.len() != before
    }

    pub(crate) fn clear(&self) {
        self.lock().listeners.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Delivers a clone of snapshot number `seq` to every listener that has
    /// not already seen a newer one.
    ///
    /// Listeners run outside the registry lock, so they may subscribe,
    /// unsubscribe, or call back into the service.
    pub(crate) fn notify(&self, seq: u64, snapshot: &ServiceState<T>) {
        let entries: Vec<Arc<Entry<T>>> = self.lock().listeners.iter().map(Arc::clone).collect();
        for entry in entries {
            entry.deliver(seq, snapshot);
        }
    }

    /// Delivers snapshot number `seq` to the listener `id` only.
    pub(crate) fn notify_one(&self, id: u64, seq: u64, snapshot: &ServiceState<T>) -> bool {
        let entry = self.lock().listeners.iter().find(|entry| entry.id == id).map(Arc::clone);
        entry.is_some_and(|entry| entry.deliver(seq, snapshot))
    }
}

/// Handle returned by `IncrementalDataService::subscribe`.
///
/// Dropping it removes the listener; [`Subscription::detach`] keeps the
/// listener registered until the service is destroyed.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription<T: Clone> {
    id: u64,
    registry: Weak<Subscribers<T>>,
    detached: bool,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(id: u64, registry: Weak<Subscribers<T>>) -> Self {
        Self { id, registry, detached: false }
    }

    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Leaves the listener registered for the lifetime of the service.
    pub fn detach(mut self) {
        self.detached = true;
    }

    fn remove(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl<T: Clone> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.remove();
    }
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).field("detached", &self.detached).finish()
    }
}
