use crate::fluent::tests::*;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tower_sessions::{
    MemoryStore, SessionStore,
    session::{Id, Record},
    session_store,
};

fn set_cookie_header(response: &axum::response::Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sso-web.sid="))
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/login?ticket=ST-valid&nextUrl=/app/")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = set_cookie_header(&response);
    assert!(cookie.contains("HttpOnly"), "cookie: {cookie}");
    assert!(cookie.contains("SameSite=Lax"), "cookie: {cookie}");
    assert!(cookie.contains("Max-Age=3600"), "cookie: {cookie}");
    assert!(!cookie.contains("Secure"), "cookie: {cookie}");
}

#[tokio::test]
async fn test_secure_cookie_from_config() {
    let config = create_config_with_toml(
        r#"
[session]
secure = true
same_site = "strict"
inactivity_timeout = "20m"
"#,
    );
    let app = create_test_router(Some(config));
    let response = send(&app, get_request("/app/login?ticket=ST-valid&nextUrl=/app/")).await;

    let cookie = set_cookie_header(&response);
    assert!(cookie.contains("Secure"), "cookie: {cookie}");
    assert!(cookie.contains("SameSite=Strict"), "cookie: {cookie}");
    assert!(cookie.contains("Max-Age=1200"), "cookie: {cookie}");
}

#[tokio::test]
async fn test_no_cookie_until_something_is_stored() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/_about")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let app = create_test_router(None);
    let cookie = sign_in(&app, "ST-valid").await;

    let (name, value) = cookie.split_once('=').unwrap();
    let tampered = format!("{name}=x{value}");
    let response = send(&app, get_with_cookie("/app/", &tampered)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/app/login"));
}

#[tokio::test]
async fn test_sessions_are_separate() {
    let app = create_test_router(None);
    let user = sign_in(&app, "ST-valid").await;
    let admin = sign_in(&app, "ST-admin").await;
    assert_ne!(user, admin);

    let body = get_body_string(send(&app, get_with_cookie("/app/", &user)).await).await;
    assert!(body.contains("<strong>jdoe</strong>"));
    let body = get_body_string(send(&app, get_with_cookie("/app/", &admin)).await).await;
    assert!(body.contains("<strong>boss</strong>"));
}

#[test]
fn test_short_session_secret_is_rejected() {
    let config = create_base_config().with_session_secret("too-short");
    assert!(FluentRouter::new(config).is_err());
}

/// Counts writes to a memory store.
#[derive(Debug, Clone, Default)]
struct CountingStore {
    inner: MemoryStore,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        self.inner.load(session_id).await
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.inner.delete(session_id).await
    }
}

fn router_with_store(store: CountingStore) -> axum::Router {
    FluentRouter::new(create_base_config())
        .unwrap()
        .with_cas_backend(Arc::new(FakeCas))
        .setup_access_log()
        .unwrap()
        .setup_static_assets()
        .unwrap()
        .setup_request_parsing()
        .unwrap()
        .setup_session_with_store(store)
        .unwrap()
        .setup_authentication()
        .unwrap()
        .setup_content_blocks()
        .unwrap()
        .setup_crawler_redirect()
        .unwrap()
        .setup_locale()
        .unwrap()
        .setup_default_routes()
        .into_inner()
        .unwrap()
}

#[tokio::test]
async fn test_custom_store_only_written_on_login() {
    let store = CountingStore::default();
    let writes = store.writes.clone();
    let app = router_with_store(store);

    send(&app, get_request("/app/_about")).await;
    send(&app, get_request("/app/static/js/app.js")).await;
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    let cookie = sign_in(&app, "ST-valid").await;
    assert!(writes.load(Ordering::SeqCst) >= 1);

    let response = send(&app, get_with_cookie("/app/", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn as_googlebot(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(
        header::USER_AGENT,
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_crawlers_never_write_sessions() {
    let store = CountingStore::default();
    let writes = store.writes.clone();
    let app = router_with_store(store);

    // The gateway gate would store its attempt flag for a browser.
    for uri in ["/app/", "/app/gateway", "/app/_about"] {
        let response = send(&app, as_googlebot(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(session_cookie(&response).is_none());
    }
    assert_eq!(writes.load(Ordering::SeqCst), 0);

    let cookie = sign_in(&app, "ST-valid").await;
    let after_login = writes.load(Ordering::SeqCst);

    for uri in ["/app/", "/app/gateway"] {
        let response = send(&app, as_googlebot(uri, Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
    assert_eq!(writes.load(Ordering::SeqCst), after_login);
}
