//! Identity provider client: the core's view of the external provider.
//!
//! DESIGN
//! ======
//! Wraps an [`IdentityProvider`] and a [`MarkerStore`]. Every provider
//! failure leaves this type already classified.
//!
//! Redirect sign-in is two-phase because the flow leaves the running
//! process: `sign_in_deferred` records a durable marker before handing
//! control to the provider, and `resume_deferred` (run once at startup)
//! collects the credential and clears the marker.

use std::sync::Arc;

use super::marker::{MarkerError, MarkerStore, RedirectMarker};
use super::provider::{ExternalCredential, ExternalPrincipal, IdentityProvider};
use crate::classify::classify;
use crate::error::{ClassifiedError, ErrorKind, RawError};

/// Provider id recorded in the marker for the redirect flow.
pub const REDIRECT_PROVIDER_ID: &str = "google.com";

pub struct IdentityProviderClient {
    provider: Arc<dyn IdentityProvider>,
    markers: Arc<dyn MarkerStore>,
}

impl IdentityProviderClient {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, markers: Arc<dyn MarkerStore>) -> Self {
        Self { provider, markers }
    }

    /// Interactive sign-in; suspends until the flow resolves or is dismissed.
    ///
    /// # Errors
    ///
    /// Dismissal classifies as `Unauthorized`; other failures per the provider.
    pub async fn sign_in_interactive(&self) -> Result<ExternalCredential, ClassifiedError> {
        tracing::info!("interactive sign-in started");
        let credential = self.provider.sign_in_with_popup().await.map_err(|e| provider_failure("interactive", &e))?;
        tracing::info!(uid = %credential.uid, "interactive sign-in resolved");
        Ok(credential)
    }

    /// Phase 1 of redirect sign-in: record the marker, then leave.
    ///
    /// The marker is written before the provider takes over so a restarted
    /// process can always find it. If the provider refuses to start, the
    /// marker is removed again.
    ///
    /// # Errors
    ///
    /// Fails if the marker cannot be stored or the provider cannot start.
    pub async fn sign_in_deferred(&self) -> Result<(), ClassifiedError> {
        self.markers
            .save(&RedirectMarker::now(REDIRECT_PROVIDER_ID))
            .map_err(|e| marker_failure(&e))?;
        tracing::info!("pending redirect marker set");

        if let Err(e) = self.provider.start_redirect_sign_in().await {
            if let Err(clear_err) = self.markers.clear() {
                tracing::warn!(error = %clear_err, "failed to clear marker after aborted redirect");
            }
            return Err(provider_failure("redirect", &e));
        }
        Ok(())
    }

    /// Phase 2 of redirect sign-in. Call once at process startup.
    ///
    /// Returns `Ok(None)` when no redirect is pending. With a marker present,
    /// asks the provider for the resolved credential and clears the marker
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// Fails (`Unauthorized`) if the provider reports no credential, or with
    /// the classified provider failure.
    pub async fn resume_deferred(&self) -> Result<Option<ExternalCredential>, ClassifiedError> {
        let marker = match self.markers.load() {
            Ok(Some(marker)) => marker,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable redirect marker discarded");
                self.clear_marker();
                return Ok(None);
            }
        };

        tracing::info!(provider = %marker.provider_id, "resuming pending redirect sign-in");
        let result = self.provider.redirect_result().await;
        self.clear_marker();

        match result {
            Ok(Some(credential)) => {
                tracing::info!(uid = %credential.uid, "redirect sign-in resolved");
                Ok(Some(credential))
            }
            Ok(None) => Err(ClassifiedError::new(ErrorKind::Unauthorized, "redirect sign-in returned no credential")),
            Err(e) => Err(provider_failure("redirect", &e)),
        }
    }

    /// Create a provider account with email and password.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad email, weak password, or email in use.
    pub async fn register_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ExternalCredential, ClassifiedError> {
        self.provider
            .create_user(email, password)
            .await
            .map_err(|e| provider_failure("register", &e))
    }

    /// Sign in to the provider with email and password.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `Unauthorized` for wrong credentials.
    pub async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ExternalCredential, ClassifiedError> {
        self.provider
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| provider_failure("password", &e))
    }

    /// Clear the external principal. Safe to call when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns the classified provider failure.
    pub async fn sign_out(&self) -> Result<(), ClassifiedError> {
        self.provider
            .sign_out()
            .await
            .map_err(|e| provider_failure("sign-out", &e))
    }

    #[must_use]
    pub fn current_external_principal(&self) -> Option<ExternalPrincipal> {
        self.provider.current_user()
    }

    /// Whether a redirect sign-in is waiting to be resumed.
    #[must_use]
    pub fn has_pending_redirect(&self) -> bool {
        matches!(self.markers.load(), Ok(Some(_)))
    }

    fn clear_marker(&self) {
        match self.markers.clear() {
            Ok(true) => tracing::info!("pending redirect marker cleared"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "failed to clear redirect marker"),
        }
    }
}

fn provider_failure(flow: &str, raw: &RawError) -> ClassifiedError {
    let err = classify(raw);
    tracing::warn!(flow, kind = ?err.kind, error = %raw, "identity provider failure");
    err
}

fn marker_failure(e: &MarkerError) -> ClassifiedError {
    tracing::warn!(error = %e, "redirect marker storage failed");
    ClassifiedError::unknown(e.to_string())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
