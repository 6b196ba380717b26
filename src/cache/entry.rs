//! Cache entry snapshot types.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::ClassifiedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl CacheStatus {
    /// `Success` or `Error`: a load has finished and its outcome is stored.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Point-in-time copy of one cache key's state.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    /// Last successfully loaded value. Kept across errors and invalidation.
    pub data: Option<T>,
    pub status: CacheStatus,
    /// Generation of the most recently started load.
    pub generation: u64,
    pub error: Option<ClassifiedError>,
    /// When `data` was last committed.
    pub updated_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn idle(key: impl Into<String>) -> Self {
        Self { key: key.into(), data: None, status: CacheStatus::Idle, generation: 0, error: None, updated_at: None }
    }

    /// A successful value that needs no reload. `stale_after: None` keeps
    /// success fresh until the key is invalidated.
    #[must_use]
    pub fn is_fresh(&self, stale_after: Option<Duration>, now: Instant) -> bool {
        if self.status != CacheStatus::Success {
            return false;
        }
        match (stale_after, self.updated_at) {
            (None, _) => true,
            (Some(window), Some(at)) => now.saturating_duration_since(at) < window,
            (Some(_), None) => false,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == CacheStatus::Loading
    }
}
