//! Transport seam between the core and the network.

use serde_json::Value;

use crate::error::RawError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A backend request, addressed by path relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), body: None }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, path: path.into(), body: Some(body) }
    }

    #[must_use]
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self { method: Method::Post, path: path.into(), body: None }
    }
}

/// A successful (2xx) backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Decoded JSON body; `Value::Null` for an empty body.
    pub body: Value,
    /// Backend session reference, when the response set the session cookie.
    pub session_ref: Option<String>,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body, session_ref: None }
    }
}

/// Sends requests to the application backend.
///
/// Implementations must return non-2xx responses as [`RawError::Http`],
/// deadline expiry as [`RawError::Timeout`], and connection failures as
/// [`RawError::Network`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RawError>;
}
