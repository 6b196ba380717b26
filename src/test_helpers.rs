//! Scripted doubles for the transport, identity provider, and marker store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::RawError;
use crate::identity::{
    ExternalCredential, ExternalPrincipal, IdentityProvider, MarkerError, MarkerStore, MemoryMarkerStore,
    RedirectMarker,
};
use crate::net::{ApiRequest, ApiResponse, Transport};

// =============================================================================
// TRANSPORT
// =============================================================================

#[derive(Clone)]
struct Scripted {
    delay: Duration,
    result: Result<ApiResponse, RawError>,
}

/// Transport answering from per-path scripts. Each path plays its responses
/// in order and repeats the last one; unscripted paths answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, result: Result<ApiResponse, RawError>) -> &Self {
        self.respond_after(path, Duration::ZERO, result)
    }

    pub fn respond_after(&self, path: &str, delay: Duration, result: Result<ApiResponse, RawError>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_default()
            .push_back(Scripted { delay, result });
        self
    }

    pub fn ok(&self, path: &str, body: Value) -> &Self {
        self.respond(path, Ok(ApiResponse::ok(body)))
    }

    pub fn user(&self, path: &str, id: i64, display_name: &str) -> &Self {
        self.ok(path, json!({ "user": { "id": id, "displayName": display_name } }))
    }

    pub fn status(&self, path: &str, status: u16) -> &Self {
        self.respond(path, Err(RawError::Http { status, body: String::new() }))
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RawError> {
        let path = request.path.clone();
        self.calls.lock().unwrap().push(request);

        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&path) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        let Some(scripted) = scripted else {
            return Err(RawError::Http { status: 404, body: format!("no route for {path}") });
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

pub fn credential(uid: &str) -> ExternalCredential {
    ExternalCredential {
        uid: uid.to_owned(),
        email: Some(format!("{uid}@example.com")),
        display_name: Some(format!("User {uid}")),
        id_token: format!("token-{uid}"),
        provider_id: "google.com".to_owned(),
    }
}

/// Provider whose every primitive returns a configurable result.
pub struct MockProvider {
    pub popup: Mutex<Result<ExternalCredential, RawError>>,
    pub redirect_start: Mutex<Result<(), RawError>>,
    pub redirect: Mutex<Result<Option<ExternalCredential>, RawError>>,
    pub create: Mutex<Result<ExternalCredential, RawError>>,
    pub password: Mutex<Result<ExternalCredential, RawError>>,
    current: Mutex<Option<ExternalPrincipal>>,
    pub redirect_starts: AtomicUsize,
    pub redirect_queries: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            popup: Mutex::new(Ok(credential("uid-1"))),
            redirect_start: Mutex::new(Ok(())),
            redirect: Mutex::new(Ok(Some(credential("uid-1")))),
            create: Mutex::new(Ok(credential("uid-1"))),
            password: Mutex::new(Ok(credential("uid-1"))),
            current: Mutex::new(None),
            redirect_starts: AtomicUsize::new(0),
            redirect_queries: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        })
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn resolve(&self, result: &Mutex<Result<ExternalCredential, RawError>>) -> Result<ExternalCredential, RawError> {
        let result = result.lock().unwrap().clone();
        if let Ok(cred) = &result {
            *self.current.lock().unwrap() = Some(cred.principal());
        }
        result
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_in_with_popup(&self) -> Result<ExternalCredential, RawError> {
        self.resolve(&self.popup)
    }

    async fn start_redirect_sign_in(&self) -> Result<(), RawError> {
        self.redirect_starts.fetch_add(1, Ordering::SeqCst);
        self.redirect_start.lock().unwrap().clone()
    }

    async fn redirect_result(&self) -> Result<Option<ExternalCredential>, RawError> {
        self.redirect_queries.fetch_add(1, Ordering::SeqCst);
        let result = self.redirect.lock().unwrap().clone();
        if let Ok(Some(cred)) = &result {
            *self.current.lock().unwrap() = Some(cred.principal());
        }
        result
    }

    async fn create_user(&self, _email: &str, _password: &str) -> Result<ExternalCredential, RawError> {
        self.resolve(&self.create)
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<ExternalCredential, RawError> {
        self.resolve(&self.password)
    }

    async fn sign_out(&self) -> Result<(), RawError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().take();
        Ok(())
    }

    fn current_user(&self) -> Option<ExternalPrincipal> {
        self.current.lock().unwrap().clone()
    }
}

// =============================================================================
// MARKER STORE
// =============================================================================

/// In-memory marker store that counts effective clears and can be made to
/// report a corrupt marker.
#[derive(Default)]
pub struct CountingMarkerStore {
    inner: MemoryMarkerStore,
    pub corrupt: Mutex<bool>,
    pub clears: AtomicUsize,
}

impl CountingMarkerStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl MarkerStore for CountingMarkerStore {
    fn load(&self) -> Result<Option<RedirectMarker>, MarkerError> {
        if *self.corrupt.lock().unwrap() {
            return Err(MarkerError::Corrupt("garbage".to_owned()));
        }
        self.inner.load()
    }

    fn save(&self, marker: &RedirectMarker) -> Result<(), MarkerError> {
        self.inner.save(marker)
    }

    fn clear(&self) -> Result<bool, MarkerError> {
        *self.corrupt.lock().unwrap() = false;
        let removed = self.inner.clear()?;
        if removed {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}
