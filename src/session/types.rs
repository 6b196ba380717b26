//! Session state values.

use serde::Serialize;

use crate::error::ClassifiedError;
use crate::identity::ExternalCredential;
use crate::net::api::Acknowledgement;
use crate::net::types::Registration;

/// Backend-confirmed authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub display_name: String,
    /// Reference to the backend session (the session cookie value), when the
    /// backend issued one.
    pub session_ref: Option<String>,
}

impl From<Acknowledgement> for Session {
    fn from(ack: Acknowledgement) -> Self {
        Self {
            user_id: ack.user.id,
            display_name: ack.user.resolved_display_name(),
            session_ref: ack.session_ref,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated(Session),
    /// Transient: announced once, then the authority returns to `Anonymous`.
    Failed(ClassifiedError),
}

impl AuthState {
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
            Self::Failed(_) => "failed",
        }
    }
}

/// What the backend is asked to acknowledge.
#[derive(Clone)]
pub enum LoginRequest {
    /// A provider credential, exchanged at `/api/login`.
    External(ExternalCredential),
    /// Email and password checked by the backend alone.
    Direct { email: String, password: String },
    /// A new account; the backend's acknowledgement logs it in.
    Register(Registration),
}

impl LoginRequest {
    #[must_use]
    pub fn direct(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Direct { email: email.into(), password: password.into() }
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::External(_) => "external",
            Self::Direct { .. } => "direct",
            Self::Register(_) => "register",
        }
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External(cred) => f
                .debug_struct("External")
                .field("uid", &cred.uid)
                .field("provider_id", &cred.provider_id)
                .finish_non_exhaustive(),
            Self::Direct { email, .. } => f.debug_struct("Direct").field("email", email).finish_non_exhaustive(),
            Self::Register(reg) => f.debug_struct("Register").field("email", &reg.email).finish_non_exhaustive(),
        }
    }
}
