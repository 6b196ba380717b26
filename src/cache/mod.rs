//! Keyed data-fetch cache.
//!
//! DESIGN
//! ======
//! One entry per key. A fetch either reuses a fresh value, joins the load
//! already in flight for the key, or starts a new load tagged with a fresh
//! generation. Only the load whose generation is still current may commit;
//! anything older is dropped on arrival. Each key has its own observer
//! registry and a `watch` channel for async waiters.

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheStatus};
pub use store::{CacheConfig, DataCache, UnauthorizedHandler};
