//! Durable pending-redirect marker.
//!
//! A redirect sign-in leaves the process; the marker is how the next process
//! knows it has a flow to rejoin. There is a single marker slot, so at most
//! one marker exists at any time.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const MARKER_FILE: &str = "pending_redirect.json";

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("marker storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("marker file is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectMarker {
    pub provider_id: String,
    /// Unix seconds when the redirect was started.
    pub started_at: u64,
}

impl RedirectMarker {
    #[must_use]
    pub fn now(provider_id: impl Into<String>) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { provider_id: provider_id.into(), started_at }
    }
}

/// Storage for the single marker slot.
pub trait MarkerStore: Send + Sync {
    fn load(&self) -> Result<Option<RedirectMarker>, MarkerError>;

    /// Write the marker, replacing any existing one.
    fn save(&self, marker: &RedirectMarker) -> Result<(), MarkerError>;

    /// Remove the marker. Returns whether one was present.
    fn clear(&self) -> Result<bool, MarkerError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Marker persisted as a JSON file, surviving process restarts.
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    /// Store the marker in `dir` (created on first save).
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self { path: dir.join(MARKER_FILE) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarkerStore for FileMarkerStore {
    fn load(&self) -> Result<Option<RedirectMarker>, MarkerError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| MarkerError::Corrupt(e.to_string()))
    }

    fn save(&self, marker: &RedirectMarker) -> Result<(), MarkerError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(marker).map_err(|e| MarkerError::Corrupt(e.to_string()))?;
        // Write-then-rename so a crash never leaves a half-written marker.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<bool, MarkerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local marker slot, for environments without durable storage.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    slot: Mutex<Option<RedirectMarker>>,
}

impl MemoryMarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self) -> Result<Option<RedirectMarker>, MarkerError> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, marker: &RedirectMarker) -> Result<(), MarkerError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(marker.clone());
        Ok(())
    }

    fn clear(&self) -> Result<bool, MarkerError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}
