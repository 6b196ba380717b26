//! Observer registry with scoped subscriptions.
//!
//! DESIGN
//! ======
//! Listeners are kept in a `BTreeMap` keyed by a monotonically increasing id,
//! so iteration order is registration order. `subscribe` hands back a
//! [`Subscription`] guard; dropping the guard (or calling
//! [`Subscription::release`]) removes the listener, so every exit path of the
//! subscriber releases it.
//!
//! `notify` snapshots the listener list and calls it with the lock released,
//! which lets a listener read (or even subscribe to) the owning component
//! without deadlocking.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ObserverSet<E> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<E>>,
}

/// An ordered set of listeners for events of type `E`.
pub struct Observers<E> {
    inner: Arc<Mutex<ObserverSet<E>>>,
}

impl<E: 'static> Observers<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(ObserverSet { next_id: 0, listeners: BTreeMap::new() })) }
    }

    /// Register a listener. It stays registered until the guard is released.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = set.next_id;
            set.next_id += 1;
            set.listeners.insert(id, Arc::new(listener));
            id
        };

        let weak: Weak<Mutex<ObserverSet<E>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut set = inner.lock().unwrap_or_else(PoisonError::into_inner);
                set.listeners.remove(&id);
            }
        })
    }

    /// Call every listener, in registration order, with `event`.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = {
            let set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            set.listeners.values().cloned().collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Observers<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

// =============================================================================
// SUBSCRIPTION GUARD
// =============================================================================

/// Scoped registration; releases its listener exactly once.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self { release: Some(Box::new(release)) }
    }

    /// Release the listener now instead of at drop.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
