//! reqwest-backed [`Transport`].
//!
//! The client keeps a cookie store so the backend session cookie set by a
//! login response rides along on every later request.

use serde_json::Value;

use super::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::config::{ApiConfig, ConfigError};
use crate::error::RawError;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session_cookie: String,
}

impl HttpTransport {
    /// Build a transport for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ConfigError::HttpClientBuild(e.to_string()))?;
        Ok(Self { client, base_url: config.base_url.clone(), session_cookie: config.session_cookie.clone() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RawError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, "backend request");
        let resp = builder.send().await.map_err(map_send_error)?;

        let status = resp.status();
        let session_ref = resp
            .cookies()
            .find(|c| c.name() == self.session_cookie)
            .map(|c| c.value().to_owned());
        let text = resp
            .text()
            .await
            .map_err(|e| RawError::Decode(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(path = %request.path, status = status.as_u16(), "backend rejected request");
            return Err(RawError::Http { status: status.as_u16(), body: text });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| RawError::Decode(e.to_string()))?
        };
        Ok(ApiResponse { status: status.as_u16(), body, session_ref })
    }
}

fn map_send_error(e: reqwest::Error) -> RawError {
    if e.is_timeout() {
        RawError::Timeout
    } else {
        RawError::Network(e.to_string())
    }
}
