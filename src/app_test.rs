use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::cache::CacheStatus;
use crate::error::{ErrorKind, RawError};
use crate::net::api::{LOGIN_DIRECT_PATH, LOGIN_EXTERNAL_PATH, LOGOUT_PATH, REGISTER_PATH};
use crate::resources::{self, COURSES_PATH, MENTORS_PATH, STATS_PATH, Stats};
use crate::test_helpers::{CountingMarkerStore, MockProvider, MockTransport};

struct Harness {
    transport: Arc<MockTransport>,
    provider: Arc<MockProvider>,
    markers: Arc<CountingMarkerStore>,
    ctx: AppContext,
}

impl Harness {
    fn new() -> Self {
        Self::with(MockTransport::new(), MockProvider::new(), CountingMarkerStore::new())
    }

    /// A context over existing doubles; sharing `markers` stands in for a
    /// process restart over the same durable state.
    fn with(transport: Arc<MockTransport>, provider: Arc<MockProvider>, markers: Arc<CountingMarkerStore>) -> Self {
        let dyn_provider: Arc<dyn IdentityProvider> = provider.clone();
        let dyn_markers: Arc<dyn MarkerStore> = markers.clone();
        let identity = Arc::new(IdentityProviderClient::new(dyn_provider, dyn_markers));
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let ctx = AppContext::new(dyn_transport, Some(identity), CacheConfig::default());
        Self { transport, provider, markers, ctx }
    }

    async fn logged_in(&self) {
        self.transport.user(LOGIN_DIRECT_PATH, 1, "A");
        self.ctx.login_direct("a@b.com", "secret1").await.unwrap();
    }
}

#[tokio::test]
async fn direct_login_then_same_tick_fetches_share_one_call() {
    let h = Harness::new();
    h.transport.ok(STATS_PATH, json!({"coursesInProgress": 4}));
    let states = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    let _sub = h.ctx.session.subscribe(move |s| sink.lock().unwrap().push(s.name()));

    h.logged_in().await;
    assert_eq!(*states.lock().unwrap(), vec!["authenticating", "authenticated"]);
    assert_eq!(h.ctx.session.current_session().unwrap().user_id, 1);

    let (a, b) = tokio::join!(
        resources::fetch::<Stats>(&h.ctx.cache, &h.ctx.transport, STATS_PATH),
        resources::fetch::<Stats>(&h.ctx.cache, &h.ctx.transport, STATS_PATH),
    );
    assert_eq!(h.transport.call_count(STATS_PATH), 1);
    assert_eq!(a.data, b.data);
}

#[tokio::test]
async fn unauthorized_fetch_ends_session_and_clears_cache() {
    let h = Harness::new();
    h.logged_in().await;
    h.transport.ok(STATS_PATH, json!({})).status(COURSES_PATH, 401);

    resources::fetch::<Stats>(&h.ctx.cache, &h.ctx.transport, STATS_PATH).await;
    let courses = resources::fetch::<Value>(&h.ctx.cache, &h.ctx.transport, COURSES_PATH).await;

    assert!(courses.error.unwrap().is_unauthorized());
    assert!(h.ctx.session.current_session().is_none());
    let stats = h.ctx.cache.peek(STATS_PATH).unwrap();
    assert_eq!(stats.status, CacheStatus::Idle);
    assert!(stats.data.is_none());
    assert_eq!(h.provider.sign_outs(), 0);
}

#[tokio::test]
async fn deferred_sign_in_completes_on_next_startup() {
    let first = Harness::new();
    first.ctx.sign_in_redirect().await.unwrap();
    assert!(first.markers.load().unwrap().is_some());

    // Next process: same durable marker, fresh context.
    let transport = MockTransport::new();
    transport.user(LOGIN_EXTERNAL_PATH, 7, "Redirected");
    let second = Harness::with(transport, MockProvider::new(), Arc::clone(&first.markers));

    let session = second.ctx.startup().await.unwrap().unwrap();

    assert_eq!(session.user_id, 7);
    assert!(second.ctx.session.state().is_authenticated());
    assert_eq!(second.markers.clears(), 1);
    assert_eq!(second.transport.call_count(LOGIN_EXTERNAL_PATH), 1);

    assert!(second.ctx.startup().await.unwrap().is_none());
    assert_eq!(second.markers.clears(), 1);
}

#[tokio::test]
async fn startup_without_pending_redirect_stays_anonymous() {
    let h = Harness::new();

    assert!(h.ctx.startup().await.unwrap().is_none());
    assert_eq!(h.ctx.session.state(), AuthState::Anonymous);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn startup_without_identity_provider_is_noop() {
    let transport: Arc<dyn Transport> = MockTransport::new();
    let ctx = AppContext::new(transport, None, CacheConfig::default());

    assert!(ctx.startup().await.unwrap().is_none());
    assert_eq!(ctx.sign_in_redirect().await.unwrap_err().kind, ErrorKind::Unknown);
}

#[tokio::test]
async fn invalidate_success_then_fetch_runs_exactly_one_loader() {
    let h = Harness::new();
    h.logged_in().await;
    h.transport.ok(MENTORS_PATH, json!([{"id": 1, "name": "Sam"}]));
    let first = resources::fetch::<Value>(&h.ctx.cache, &h.ctx.transport, MENTORS_PATH).await;
    assert_eq!(first.status, CacheStatus::Success);

    h.ctx.cache.invalidate(MENTORS_PATH);
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let transport = Arc::clone(&h.ctx.transport);
    let entry = h
        .ctx
        .cache
        .fetch_settled(MENTORS_PATH, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            resources::loader(&transport, MENTORS_PATH)()
        })
        .await;

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(h.transport.call_count(MENTORS_PATH), 2);
}

#[tokio::test]
async fn logout_clears_cached_resources() {
    let h = Harness::new();
    h.logged_in().await;
    h.transport.ok(STATS_PATH, json!({"coursesInProgress": 1})).ok(LOGOUT_PATH, json!({}));
    resources::fetch::<Stats>(&h.ctx.cache, &h.ctx.transport, STATS_PATH).await;

    h.ctx.logout().await.unwrap();

    assert!(h.ctx.cache.peek(STATS_PATH).unwrap().data.is_none());
    assert!(h.ctx.session.current_session().is_none());
    assert_eq!(h.provider.sign_outs(), 1);
}

#[tokio::test]
async fn logout_supersedes_load_in_flight() {
    let h = Harness::new();
    h.logged_in().await;
    h.transport
        .respond_after(STATS_PATH, Duration::from_millis(40), Ok(crate::net::ApiResponse::ok(json!({}))))
        .ok(LOGOUT_PATH, json!({}));

    h.ctx.cache.fetch(STATS_PATH, resources::loader(&h.ctx.transport, STATS_PATH));
    h.ctx.logout().await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let entry = h.ctx.cache.peek(STATS_PATH).unwrap();
    assert_eq!(entry.status, CacheStatus::Idle);
    assert!(entry.data.is_none());
}

#[tokio::test]
async fn relogin_as_another_user_drops_previous_users_resources() {
    let h = Harness::new();
    h.transport
        .user(LOGIN_DIRECT_PATH, 1, "A")
        .user(LOGIN_DIRECT_PATH, 2, "B")
        .ok(LOGOUT_PATH, json!({}))
        .ok(COURSES_PATH, json!([{"id": 1, "title": "A-private"}]))
        .ok(COURSES_PATH, json!([{"id": 2, "title": "B-private"}]));

    h.ctx.login_direct("a@b.com", "secret1").await.unwrap();
    let first = resources::fetch::<Value>(&h.ctx.cache, &h.ctx.transport, COURSES_PATH).await;
    assert_eq!(first.data.unwrap()[0]["title"], "A-private");

    h.ctx.login_direct("b@b.com", "secret2").await.unwrap();
    let second = resources::fetch::<Value>(&h.ctx.cache, &h.ctx.transport, COURSES_PATH).await;

    assert_eq!(h.ctx.session.current_session().unwrap().user_id, 2);
    assert_eq!(h.transport.call_count(COURSES_PATH), 2);
    assert_eq!(second.data.unwrap()[0]["title"], "B-private");
    assert_eq!(h.transport.call_count(LOGOUT_PATH), 1);
}

#[tokio::test]
async fn register_creates_provider_account_first() {
    let h = Harness::new();
    h.transport.user(REGISTER_PATH, 11, "Newbie");

    let session = h.ctx.register(Registration::new("n@b.com", "secret1")).await.unwrap();

    assert_eq!(session.user_id, 11);
    let body = h.transport.calls()[0].body.clone().unwrap();
    assert_eq!(body["firebaseUid"], "uid-1");
}

#[tokio::test]
async fn register_stops_on_provider_validation_error() {
    let h = Harness::new();
    *h.provider.create.lock().unwrap() = Err(RawError::provider("auth/invalid-email", "bad email"));

    let err = h.ctx.register(Registration::new("nope", "secret1")).await.unwrap_err();

    assert_eq!(err.field(), Some("email"));
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.ctx.session.state(), AuthState::Anonymous);
}

#[tokio::test]
async fn dismissed_interactive_sign_in_never_reaches_backend() {
    let h = Harness::new();
    *h.provider.popup.lock().unwrap() = Err(RawError::provider("auth/popup-closed-by-user", "closed"));

    let err = h.ctx.sign_in_interactive().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn provider_password_sign_in_exchanges_with_backend() {
    let h = Harness::new();
    h.transport.user(LOGIN_EXTERNAL_PATH, 3, "C");

    let session = h.ctx.sign_in_with_credentials("c@b.com", "secret1").await.unwrap();

    assert_eq!(session.user_id, 3);
    assert_eq!(h.transport.call_count(LOGIN_EXTERNAL_PATH), 1);
}

#[tokio::test]
async fn dashboard_reports_sections() {
    let h = Harness::new();
    h.logged_in().await;
    h.transport.ok(STATS_PATH, json!({"certificatesEarned": 2}));

    let dashboard = h.ctx.dashboard().await;

    assert_eq!(dashboard.stats.data.as_ref().unwrap().certificates_earned, 2);
    assert_eq!(dashboard.failed_sections().len(), 4);
}
