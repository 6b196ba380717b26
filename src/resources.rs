//! Typed dashboard resources and their cache-backed loaders.
//!
//! The cache stores each resource as the JSON the backend sent, keyed by its
//! path. Typed views decode on read; decoding is lenient so a backend that
//! adds or omits fields does not blank the dashboard.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::cache::{CacheEntry, CacheStatus, DataCache};
use crate::error::{ClassifiedError, RawError};
use crate::net::{Transport, api};

pub const STATS_PATH: &str = "/api/stats";
pub const COURSES_PATH: &str = "/api/user/courses";
pub const OPPORTUNITIES_PATH: &str = "/api/opportunities";
pub const MENTORS_PATH: &str = "/api/mentors";
pub const ARTICLES_PATH: &str = "/api/articles";

/// Every key the dashboard loads.
pub const DASHBOARD_KEYS: [&str; 5] = [STATS_PATH, COURSES_PATH, OPPORTUNITIES_PATH, MENTORS_PATH, ARTICLES_PATH];

// =============================================================================
// RESOURCE TYPES
// =============================================================================

/// Dashboard counters. Missing or null counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default, deserialize_with = "count")]
    pub courses_in_progress: u64,
    #[serde(default, deserialize_with = "count")]
    pub certificates_earned: u64,
    #[serde(default, deserialize_with = "count")]
    pub mentor_sessions: u64,
    #[serde(default, deserialize_with = "count")]
    pub opportunities_saved: u64,
}

fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Option::<u64>::deserialize(d).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mentor {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// LOADING
// =============================================================================

/// Settled view of one resource key, decoded to `T`.
#[derive(Debug, Clone, Serialize)]
pub struct Loaded<T> {
    pub status: CacheStatus,
    pub data: Option<T>,
    pub error: Option<ClassifiedError>,
}

impl<T: DeserializeOwned> Loaded<T> {
    /// Decode a cache entry. Undecodable data is reported as an error and
    /// dropped.
    #[must_use]
    pub fn from_entry(entry: CacheEntry<Value>) -> Self {
        let mut error = entry.error;
        let data = entry.data.and_then(|raw| match serde_json::from_value(raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key = %entry.key, error = %e, "resource did not decode");
                error.get_or_insert_with(|| RawError::Decode(e.to_string()).into());
                None
            }
        });
        Self { status: entry.status, data, error }
    }
}

/// Loader for `path` suitable for [`DataCache::fetch`].
pub fn loader(
    transport: &Arc<dyn Transport>,
    path: &str,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<Value, RawError>> + Send>> + use<> {
    let transport = Arc::clone(transport);
    let path = path.to_owned();
    move || Box::pin(async move { api::get_json(transport.as_ref(), &path).await })
}

/// Fetch one resource through the cache and wait for it to settle.
pub async fn fetch<T: DeserializeOwned>(
    cache: &DataCache<Value>,
    transport: &Arc<dyn Transport>,
    path: &str,
) -> Loaded<T> {
    Loaded::from_entry(cache.fetch_settled(path, loader(transport, path)).await)
}

/// Everything the dashboard shows. Each section succeeds or fails on its own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: Loaded<Stats>,
    pub courses: Loaded<Vec<Course>>,
    pub opportunities: Loaded<Vec<Opportunity>>,
    pub mentors: Loaded<Vec<Mentor>>,
    pub articles: Loaded<Vec<Article>>,
}

impl Dashboard {
    /// Load all five sections concurrently.
    pub async fn load(cache: &DataCache<Value>, transport: &Arc<dyn Transport>) -> Self {
        let (stats, courses, opportunities, mentors, articles) = tokio::join!(
            fetch(cache, transport, STATS_PATH),
            fetch(cache, transport, COURSES_PATH),
            fetch(cache, transport, OPPORTUNITIES_PATH),
            fetch(cache, transport, MENTORS_PATH),
            fetch(cache, transport, ARTICLES_PATH),
        );
        Self { stats, courses, opportunities, mentors, articles }
    }

    /// Sections that settled with an error.
    #[must_use]
    pub fn failed_sections(&self) -> Vec<&'static str> {
        [
            (STATS_PATH, self.stats.error.is_some()),
            (COURSES_PATH, self.courses.error.is_some()),
            (OPPORTUNITIES_PATH, self.opportunities.error.is_some()),
            (MENTORS_PATH, self.mentors.error.is_some()),
            (ARTICLES_PATH, self.articles.error.is_some()),
        ]
        .into_iter()
        .filter_map(|(path, failed)| failed.then_some(path))
        .collect()
    }
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod tests;
