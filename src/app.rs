//! Process-scoped application context.
//!
//! DESIGN
//! ======
//! `AppContext` owns the transport, the identity client, the session
//! authority, and the data cache, and wires them together once:
//! - the cache reports committed `Unauthorized` loads to the authority,
//!   which drops the session;
//! - the cache clears itself whenever the session ends, so no resource
//!   loaded for one user is served to the next.
//!
//! Tests build a fresh context per case; nothing here is global.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{CacheConfig, DataCache};
use crate::config::{AppConfig, ConfigError};
use crate::error::ClassifiedError;
use crate::identity::{FileMarkerStore, IdentityProvider, IdentityProviderClient, MarkerStore, RestIdentityProvider};
use crate::net::types::Registration;
use crate::net::{HttpTransport, Transport};
use crate::observers::Subscription;
use crate::resources::Dashboard;
use crate::session::{AuthState, LoginRequest, Session, SessionAuthority};

#[derive(Clone)]
pub struct AppContext {
    pub transport: Arc<dyn Transport>,
    pub identity: Option<Arc<IdentityProviderClient>>,
    pub session: Arc<SessionAuthority>,
    pub cache: DataCache<Value>,
    _clear_on_session_end: Arc<Subscription>,
}

impl AppContext {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Option<Arc<IdentityProviderClient>>,
        cache_config: CacheConfig,
    ) -> Self {
        let session = Arc::new(SessionAuthority::new(Arc::clone(&transport), identity.clone()));
        let cache = DataCache::new(cache_config);
        cache.set_unauthorized_handler(&session);

        let on_end = cache.clone();
        let subscription = session.subscribe(move |state| {
            if *state == AuthState::Anonymous {
                on_end.clear();
            }
        });

        Self { transport, identity, session, cache, _clear_on_session_end: Arc::new(subscription) }
    }

    /// Build the production context: HTTP transport, the REST identity
    /// provider when configured, and a file-backed redirect marker.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.api)?);

        let identity = match &config.identity {
            Some(identity_config) => {
                let provider: Arc<dyn IdentityProvider> = Arc::new(RestIdentityProvider::new(identity_config.clone())?);
                let markers: Arc<dyn MarkerStore> = Arc::new(FileMarkerStore::new(&config.state_dir));
                tracing::info!(
                    project = %identity_config.project_id,
                    auth_domain = %identity_config.auth_domain(),
                    "identity provider enabled"
                );
                Some(Arc::new(IdentityProviderClient::new(provider, markers)))
            }
            None => {
                tracing::warn!("identity provider not configured; provider sign-in disabled");
                None
            }
        };

        Ok(Self::new(transport, identity, config.cache))
    }

    /// Resume a pending redirect sign-in, if any, and log in with it.
    ///
    /// # Errors
    ///
    /// Returns the classified provider or backend failure.
    pub async fn startup(&self) -> Result<Option<Session>, ClassifiedError> {
        let Some(identity) = &self.identity else {
            return Ok(None);
        };
        match identity.resume_deferred().await? {
            Some(credential) => self.session.login(LoginRequest::External(credential)).await.map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // SIGN-IN FLOWS
    // =========================================================================

    /// Interactive provider sign-in followed by the backend exchange.
    ///
    /// # Errors
    ///
    /// Returns the classified provider or backend failure.
    pub async fn sign_in_interactive(&self) -> Result<Session, ClassifiedError> {
        let credential = self.identity_client()?.sign_in_interactive().await?;
        self.session.login(LoginRequest::External(credential)).await
    }

    /// Start a redirect sign-in. It completes in [`AppContext::startup`] of a
    /// later process.
    ///
    /// # Errors
    ///
    /// Returns the classified provider or marker failure.
    pub async fn sign_in_redirect(&self) -> Result<(), ClassifiedError> {
        self.identity_client()?.sign_in_deferred().await
    }

    /// Provider email/password sign-in followed by the backend exchange.
    ///
    /// # Errors
    ///
    /// Returns the classified provider or backend failure.
    pub async fn sign_in_with_credentials(&self, email: &str, password: &str) -> Result<Session, ClassifiedError> {
        let credential = self.identity_client()?.sign_in_with_credentials(email, password).await?;
        self.session.login(LoginRequest::External(credential)).await
    }

    /// Backend-only email/password login.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    pub async fn login_direct(&self, email: &str, password: &str) -> Result<Session, ClassifiedError> {
        self.session.login(LoginRequest::direct(email, password)).await
    }

    /// Create the account with the provider (when configured), then register
    /// it with the backend, which logs it in.
    ///
    /// # Errors
    ///
    /// Returns the classified provider or backend failure.
    pub async fn register(&self, mut registration: Registration) -> Result<Session, ClassifiedError> {
        if let Some(identity) = &self.identity {
            let credential = identity
                .register_with_credentials(&registration.email, &registration.password)
                .await?;
            registration.firebase_uid = Some(credential.uid);
        }
        self.session.login(LoginRequest::Register(registration)).await
    }

    /// # Errors
    ///
    /// Returns the first remote failure; local state is cleared regardless.
    pub async fn logout(&self) -> Result<(), ClassifiedError> {
        self.session.logout().await
    }

    pub async fn dashboard(&self) -> Dashboard {
        Dashboard::load(&self.cache, &self.transport).await
    }

    fn identity_client(&self) -> Result<&IdentityProviderClient, ClassifiedError> {
        self.identity
            .as_deref()
            .ok_or_else(|| ClassifiedError::unknown("identity provider not configured"))
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
