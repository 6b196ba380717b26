//! Error types shared across the session and cache layers.
//!
//! DESIGN
//! ======
//! Two tiers. `RawError` is what the transport and the identity provider
//! hand back: unclassified and shaped by wherever it came from.
//! `ClassifiedError` is the closed taxonomy produced by
//! [`crate::classify::classify`]; it is the only error the session authority
//! and the data cache ever store or broadcast.

use serde::Serialize;

// =============================================================================
// RAW ERRORS
// =============================================================================

/// Unclassified failure from the transport or the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RawError {
    /// The server answered with a non-success status.
    #[error("{status}: {body}")]
    Http { status: u16, body: String },

    /// The request did not complete within the transport's deadline.
    #[error("request timed out")]
    Timeout,

    /// No response was received (connection refused, DNS, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The identity provider reported a failure with a provider error code
    /// such as `auth/wrong-password`.
    #[error("identity provider error {code}: {message}")]
    Provider { code: String, message: String },
}

impl RawError {
    #[must_use]
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { code: code.into(), message: message.into() }
    }
}

// =============================================================================
// CLASSIFIED ERRORS
// =============================================================================

/// Closed failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    /// A single form field was rejected; render next to that field.
    Validation { field: String, message: String },
    Unauthorized,
    NotFound,
    ServerError,
    Unknown,
}

/// A failure normalized into [`ErrorKind`] plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.kind, ErrorKind::Unauthorized)
    }

    /// The rejected field, when this is a validation failure.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<RawError> for ClassifiedError {
    fn from(raw: RawError) -> Self {
        crate::classify::classify(&raw)
    }
}
