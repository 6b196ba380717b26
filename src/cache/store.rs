//! `DataCache`: deduplicating, generation-tagged keyed cache.
//!
//! CONCURRENCY
//! ===========
//! All entry state lives behind one mutex that is never held across an
//! `.await` or while listeners run. A load's `loading` status and generation
//! are committed under the lock before the loader is polled, so a
//! concurrent fetch for the same key always sees the load in flight and
//! joins it instead of starting another.
//!
//! There is no cancellation. A superseded load still runs to completion;
//! its result is discarded when it settles because the key's generation has
//! moved on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::entry::{CacheEntry, CacheStatus};
use crate::classify::classify;
use crate::error::{ClassifiedError, RawError};
use crate::observers::{Observers, Subscription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a successful value stays fresh. `None`: until invalidated.
    pub stale_after: Option<Duration>,
}

/// Receives `Unauthorized` outcomes from committed loads.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self, key: &str, error: &ClassifiedError);
}

struct Slot<T> {
    entry: CacheEntry<T>,
    observers: Observers<CacheEntry<T>>,
    watch: watch::Sender<CacheEntry<T>>,
}

impl<T: Clone + Send + Sync + 'static> Slot<T> {
    fn new(key: &str) -> Self {
        let entry = CacheEntry::idle(key);
        let (watch, _) = watch::channel(entry.clone());
        Self { entry, observers: Observers::new(), watch }
    }

    /// Publish the current entry to waiters; hand back what listeners need.
    fn publish(&self) -> (Observers<CacheEntry<T>>, CacheEntry<T>) {
        self.watch.send_replace(self.entry.clone());
        (self.observers.clone(), self.entry.clone())
    }
}

struct CacheInner<T> {
    config: CacheConfig,
    slots: Mutex<HashMap<String, Slot<T>>>,
    next_generation: AtomicU64,
    unauthorized: Mutex<Option<Weak<dyn UnauthorizedHandler>>>,
}

/// Shared handle to the cache; clones refer to the same store.
pub struct DataCache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for DataCache<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Clone + Send + Sync + 'static> DataCache<T> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                slots: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                unauthorized: Mutex::new(None),
            }),
        }
    }

    /// Route `Unauthorized` load outcomes to `handler`. Held weakly so the
    /// cache never keeps its session owner alive.
    pub fn set_unauthorized_handler<H>(&self, handler: &Arc<H>)
    where
        H: UnauthorizedHandler + 'static,
    {
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn UnauthorizedHandler> = weak;
        *self
            .inner
            .unauthorized
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    /// Return the key's current entry and, unless a fresh value exists or a
    /// load is already in flight, start `loader` under a new generation.
    ///
    /// The returned snapshot reflects the state after this call: `Loading`
    /// when a load is running (new or joined), otherwise the stored entry.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; the load runs as a task.
    pub fn fetch<F, Fut>(&self, key: &str, loader: F) -> CacheEntry<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>> + Send + 'static,
    {
        let (observers, snapshot, generation) = {
            let mut slots = self.slots();
            let slot = slots
                .entry(key.to_owned())
                .or_insert_with(|| Slot::new(key));

            if slot.entry.is_loading() {
                tracing::debug!(%key, generation = slot.entry.generation, "joining in-flight load");
                return slot.entry.clone();
            }
            if slot.entry.is_fresh(self.inner.config.stale_after, Instant::now()) {
                return slot.entry.clone();
            }

            let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
            slot.entry.status = CacheStatus::Loading;
            slot.entry.generation = generation;
            let (observers, snapshot) = slot.publish();
            (observers, snapshot, generation)
        };

        tracing::debug!(%key, generation, "load started");
        observers.notify(&snapshot);

        let load = loader();
        let cache = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(load).await {
                Ok(result) => result.map_err(|raw| classify(&raw)),
                Err(join_err) => Err(ClassifiedError::unknown(format!("loader failed: {join_err}"))),
            };
            cache.settle(&key, generation, outcome);
        });

        snapshot
    }

    /// [`DataCache::fetch`], then wait until the key settles.
    ///
    /// Every caller joining the same load observes the same committed
    /// outcome. If the entry is cleared while waiting, the idle entry is
    /// returned.
    pub async fn fetch_settled<F, Fut>(&self, key: &str, loader: F) -> CacheEntry<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>> + Send + 'static,
    {
        // Listen before starting so no transition is missed. Listeners see
        // every transition in order, unlike `watch`, which keeps only the
        // latest value.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = self.subscribe(key, move |e: &CacheEntry<T>| {
            let _ = tx.send(e.clone());
        });

        let snapshot = self.fetch(key, loader);
        if snapshot.status.is_settled() {
            return snapshot;
        }

        let started = snapshot.generation;
        while let Some(entry) = rx.recv().await {
            let cleared = entry.generation != started && entry.status == CacheStatus::Idle;
            if entry.status.is_settled() || cleared {
                return entry;
            }
        }
        self.peek(key).unwrap_or_else(|| CacheEntry::idle(key))
    }

    /// Mark the key idle so the next fetch reloads. Data is kept so callers
    /// can keep showing it meanwhile. Does not start a load.
    pub fn invalidate(&self, key: &str) {
        let published = {
            let mut slots = self.slots();
            let Some(slot) = slots.get_mut(key) else {
                return;
            };
            slot.entry.status = CacheStatus::Idle;
            slot.publish()
        };
        tracing::debug!(%key, "invalidated");
        let (observers, snapshot) = published;
        observers.notify(&snapshot);
    }

    /// Reset every entry to empty idle and supersede all in-flight loads.
    pub fn clear(&self) {
        let published: Vec<_> = {
            let mut slots = self.slots();
            slots
                .values_mut()
                .map(|slot| {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
                    slot.entry = CacheEntry { generation, ..CacheEntry::idle(slot.entry.key.clone()) };
                    slot.publish()
                })
                .collect()
        };
        tracing::debug!(entries = published.len(), "cache cleared");
        for (observers, snapshot) in published {
            observers.notify(&snapshot);
        }
    }

    /// Register `listener` for every change to `key`'s entry. The entry is
    /// created idle if this is the first reference to the key.
    pub fn subscribe<F>(&self, key: &str, listener: F) -> Subscription
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let mut slots = self.slots();
        let slot = slots
            .entry(key.to_owned())
            .or_insert_with(|| Slot::new(key));
        slot.observers.subscribe(listener)
    }

    /// Async view of the key's entry.
    #[must_use]
    pub fn watch(&self, key: &str) -> watch::Receiver<CacheEntry<T>> {
        let mut slots = self.slots();
        let slot = slots
            .entry(key.to_owned())
            .or_insert_with(|| Slot::new(key));
        slot.watch.subscribe()
    }

    #[must_use]
    pub fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
        self.slots().get(key).map(|slot| slot.entry.clone())
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.slots().get(key).map_or(0, |slot| slot.observers.len())
    }

    fn settle(&self, key: &str, generation: u64, outcome: Result<T, ClassifiedError>) {
        let (observers, snapshot) = {
            let mut slots = self.slots();
            let Some(slot) = slots.get_mut(key) else {
                return;
            };
            if slot.entry.generation != generation {
                tracing::debug!(
                    %key,
                    generation,
                    current = slot.entry.generation,
                    "discarding superseded load result"
                );
                return;
            }

            match outcome {
                Ok(data) => {
                    slot.entry.status = CacheStatus::Success;
                    slot.entry.data = Some(data);
                    slot.entry.error = None;
                    slot.entry.updated_at = Some(Instant::now());
                }
                Err(err) => {
                    slot.entry.status = CacheStatus::Error;
                    slot.entry.error = Some(err);
                }
            }
            slot.publish()
        };

        match &snapshot.error {
            None => tracing::debug!(%key, generation, "load committed"),
            Some(err) => tracing::warn!(%key, generation, kind = ?err.kind, error = %err, "load failed"),
        }
        observers.notify(&snapshot);

        if let Some(err) = snapshot.error.as_ref().filter(|e| e.is_unauthorized()) {
            self.report_unauthorized(key, err);
        }
    }

    fn report_unauthorized(&self, key: &str, err: &ClassifiedError) {
        let handler = self
            .inner
            .unauthorized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(handler) = handler {
            tracing::info!(%key, "unauthorized load result; invalidating session");
            handler.on_unauthorized(key, err);
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for DataCache<T> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
