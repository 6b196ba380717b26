//! `SessionAuthority`, the single writer of the process session.
//!
//! DESIGN
//! ======
//! An explicit state machine over [`AuthState`]. The identity provider and
//! the backend are inputs to it, never mirrors of it: a session exists only
//! once the backend has acknowledged a credential, and the identity in the
//! session is the one the backend confirmed.
//!
//! Every login bumps an attempt counter. A backend answer only commits if
//! its attempt is still the latest, so a logout (or a newer login) issued
//! while a login is in flight wins over that login's late result. A login
//! issued while a session is active ends that session first, so the
//! transition always passes through `Anonymous`.
//!
//! ERROR HANDLING
//! ==============
//! All failures are returned classified. A failed login is announced once as
//! `Failed` and the authority then settles back to `Anonymous`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::types::{AuthState, LoginRequest, Session};
use crate::cache::UnauthorizedHandler;
use crate::classify::classify;
use crate::error::{ClassifiedError, ErrorKind};
use crate::identity::IdentityProviderClient;
use crate::net::{Transport, api};
use crate::observers::{Observers, Subscription};

struct AuthInner {
    state: AuthState,
    attempt: u64,
}

pub struct SessionAuthority {
    transport: Arc<dyn Transport>,
    identity: Option<Arc<IdentityProviderClient>>,
    inner: Mutex<AuthInner>,
    observers: Observers<AuthState>,
}

impl SessionAuthority {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, identity: Option<Arc<IdentityProviderClient>>) -> Self {
        Self {
            transport,
            identity,
            inner: Mutex::new(AuthInner { state: AuthState::Anonymous, attempt: 0 }),
            observers: Observers::new(),
        }
    }

    // =========================================================================
    // LOGIN / LOGOUT
    // =========================================================================

    /// Have the backend acknowledge `request` and install the resulting
    /// session.
    ///
    /// # Errors
    ///
    /// Returns the classified backend or transport failure. A login that was
    /// overtaken by a logout or a newer login while in flight fails with
    /// `Unknown` and leaves the newer state in place.
    pub async fn login(&self, request: LoginRequest) -> Result<Session, ClassifiedError> {
        if self.state().is_authenticated() {
            self.end_backend_session("replaced by new login").await;
            if self.reset(true) {
                tracing::info!("previous session ended before login");
            }
        }

        let attempt = {
            let mut inner = self.lock();
            inner.attempt += 1;
            inner.state = AuthState::Authenticating;
            inner.attempt
        };
        tracing::info!(method = request.method(), attempt, "login started");
        self.observers.notify(&AuthState::Authenticating);

        let transport = self.transport.as_ref();
        let result = match &request {
            LoginRequest::External(credential) => api::login_external(transport, credential).await,
            LoginRequest::Direct { email, password } => api::login_direct(transport, email, password).await,
            LoginRequest::Register(registration) => api::register(transport, registration).await,
        };

        match result {
            Ok(ack) => {
                let session = Session::from(ack);
                if !self.commit(attempt, AuthState::Authenticated(session.clone())) {
                    tracing::info!(attempt, "login result discarded; superseded");
                    // The backend may have opened a session after a logout
                    // already went out. A newer login owns the cookie jar.
                    if self.state() == AuthState::Anonymous {
                        self.end_backend_session("superseded login").await;
                    }
                    return Err(superseded());
                }
                tracing::info!(user_id = session.user_id, attempt, "login succeeded");
                Ok(session)
            }
            Err(raw) => {
                let err = classify(&raw);
                tracing::warn!(method = request.method(), kind = ?err.kind, error = %raw, "login rejected");
                if self.commit(attempt, AuthState::Failed(err.clone())) {
                    self.commit(attempt, AuthState::Anonymous);
                    // A credential the backend refused must not linger as a
                    // signed-in provider principal.
                    if matches!(request, LoginRequest::External(_)) {
                        self.sign_out_provider().await;
                    }
                }
                Err(err)
            }
        }
    }

    /// End the session: backend session first, then the external principal,
    /// then local state. Local state is cleared even when a remote step
    /// fails. Calling it without a session is a no-op that succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first remote failure, after local state has been cleared.
    /// A backend `Unauthorized` means the session was already gone and is
    /// not an error.
    pub async fn logout(&self) -> Result<(), ClassifiedError> {
        let had_session = {
            let mut inner = self.lock();
            inner.attempt += 1;
            !matches!(inner.state, AuthState::Anonymous | AuthState::Failed(_))
        };

        let backend = if had_session { self.backend_logout().await } else { Ok(()) };
        if let Err(err) = &backend {
            tracing::warn!(kind = ?err.kind, error = %err, "backend logout failed");
        }

        let provider = match &self.identity {
            Some(identity) => identity.sign_out().await,
            None => Ok(()),
        };

        if self.reset(false) {
            tracing::info!("logged out");
        }
        backend.and(provider)
    }

    /// Drop the session after the backend reported it gone. Returns whether
    /// a session was cleared. The external principal is left alone.
    pub fn invalidate_session(&self) -> bool {
        let cleared = self.reset(true);
        if cleared {
            tracing::warn!("session invalidated by unauthorized response");
        }
        cleared
    }

    // =========================================================================
    // READS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().state.session().cloned()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Arc<IdentityProviderClient>> {
        self.identity.as_ref()
    }

    /// Listen for state transitions, delivered synchronously in registration
    /// order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        self.observers.subscribe(listener)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Set `state` if `attempt` is still the latest login. Returns whether
    /// it was applied.
    fn commit(&self, attempt: u64, state: AuthState) -> bool {
        {
            let mut inner = self.lock();
            if inner.attempt != attempt {
                return false;
            }
            inner.state = state.clone();
        }
        self.observers.notify(&state);
        true
    }

    /// Move to `Anonymous`, superseding any login in flight. Returns whether
    /// the state changed.
    fn reset(&self, only_when_authenticated: bool) -> bool {
        {
            let mut inner = self.lock();
            if only_when_authenticated && !inner.state.is_authenticated() {
                return false;
            }
            inner.attempt += 1;
            if inner.state == AuthState::Anonymous {
                return false;
            }
            inner.state = AuthState::Anonymous;
        }
        self.observers.notify(&AuthState::Anonymous);
        true
    }

    /// A backend `Unauthorized` means the session is already gone.
    async fn backend_logout(&self) -> Result<(), ClassifiedError> {
        match api::logout(self.transport.as_ref()).await.map_err(|e| classify(&e)) {
            Err(err) if err.is_unauthorized() => Ok(()),
            other => other,
        }
    }

    async fn end_backend_session(&self, reason: &'static str) {
        if let Err(err) = self.backend_logout().await {
            tracing::warn!(reason, kind = ?err.kind, error = %err, "backend logout failed");
        }
    }

    async fn sign_out_provider(&self) {
        if let Some(identity) = &self.identity {
            if let Err(e) = identity.sign_out().await {
                tracing::warn!(error = %e, "provider sign-out after rejected login failed");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UnauthorizedHandler for SessionAuthority {
    fn on_unauthorized(&self, key: &str, _error: &ClassifiedError) {
        tracing::debug!(%key, "unauthorized resource response");
        self.invalidate_session();
    }
}

fn superseded() -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Unknown, "login superseded by a later session change")
}

#[cfg(test)]
#[path = "authority_test.rs"]
mod tests;
