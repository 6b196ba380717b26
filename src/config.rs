//! Application configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_COOKIE: &str = "connect.sid";
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no state directory available; set PORTFOLIO_STATE_DIR")]
    NoStateDir,
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

/// Backend API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    /// Name of the cookie carrying the backend session reference.
    pub session_cookie: String,
}

impl ApiConfig {
    /// Read `PORTFOLIO_API_BASE_URL`, `PORTFOLIO_REQUEST_TIMEOUT_SECS`,
    /// `PORTFOLIO_CONNECT_TIMEOUT_SECS`, `PORTFOLIO_SESSION_COOKIE`.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("PORTFOLIO_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeouts = Timeouts {
            request_secs: env_parse("PORTFOLIO_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("PORTFOLIO_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let session_cookie =
            std::env::var("PORTFOLIO_SESSION_COOKIE").unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string());
        Self { base_url, timeouts, session_cookie }
    }
}

/// Identity provider project settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub api_key: String,
    pub project_id: String,
    pub app_id: String,
    pub endpoint: String,
    pub timeouts: Timeouts,
}

impl IdentityConfig {
    /// Load from `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID`, `FIREBASE_APP_ID`.
    /// Returns `None` if any are missing (provider sign-in will be disabled).
    /// `FIREBASE_AUTH_ENDPOINT` overrides the REST endpoint.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = non_empty_var("FIREBASE_API_KEY")?;
        let project_id = non_empty_var("FIREBASE_PROJECT_ID")?;
        let app_id = non_empty_var("FIREBASE_APP_ID")?;
        let endpoint = std::env::var("FIREBASE_AUTH_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_IDENTITY_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeouts = Timeouts {
            request_secs: env_parse("PORTFOLIO_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("PORTFOLIO_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Some(Self { api_key, project_id, app_id, endpoint, timeouts })
    }

    #[must_use]
    pub fn auth_domain(&self) -> String {
        format!("{}.firebaseapp.com", self.project_id)
    }
}

/// Everything the process needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub identity: Option<IdentityConfig>,
    pub cache: CacheConfig,
    /// Directory holding durable client state (the pending-redirect marker).
    pub state_dir: PathBuf,
}

impl AppConfig {
    /// Build the full config from the environment.
    ///
    /// `PORTFOLIO_STATE_DIR` overrides the platform data directory;
    /// `PORTFOLIO_CACHE_STALE_SECS` sets how long successful data stays fresh
    /// (unset: until invalidated).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoStateDir`] if no state directory is configured
    /// and the platform has no home directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = match std::env::var("PORTFOLIO_STATE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => directories::ProjectDirs::from("io", "Portfolio", "portfolio")
                .map(|dirs| dirs.data_local_dir().to_path_buf())
                .ok_or(ConfigError::NoStateDir)?,
        };
        let stale_after = std::env::var("PORTFOLIO_CACHE_STALE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        Ok(Self {
            api: ApiConfig::from_env(),
            identity: IdentityConfig::from_env(),
            cache: CacheConfig { stale_after },
            state_dir,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
