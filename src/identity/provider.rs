//! Identity provider capability and the values it produces.

use serde::{Deserialize, Serialize};

use crate::error::RawError;

/// Proof of identity issued by the external provider.
///
/// Holding one does not mean the user is logged in: only the backend can
/// turn it into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCredential {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub id_token: String,
    /// Which sign-in method produced it (`password`, `google.com`, ...).
    pub provider_id: String,
}

impl ExternalCredential {
    #[must_use]
    pub fn principal(&self) -> ExternalPrincipal {
        ExternalPrincipal {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// The principal the provider currently considers signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPrincipal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Raw sign-in primitives of an external identity provider.
///
/// Failures are reported unclassified, as [`RawError::Provider`] with the
/// provider's error code or as transport errors.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the provider's interactive (popup) flow until it resolves.
    async fn sign_in_with_popup(&self) -> Result<ExternalCredential, RawError>;

    /// Hand control to the provider's redirect flow. The result is only
    /// available to a later process via [`IdentityProvider::redirect_result`].
    async fn start_redirect_sign_in(&self) -> Result<(), RawError>;

    /// Credential produced by a completed redirect flow, if any.
    async fn redirect_result(&self) -> Result<Option<ExternalCredential>, RawError>;

    async fn create_user(&self, email: &str, password: &str) -> Result<ExternalCredential, RawError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ExternalCredential, RawError>;

    async fn sign_out(&self) -> Result<(), RawError>;

    fn current_user(&self) -> Option<ExternalPrincipal>;
}
