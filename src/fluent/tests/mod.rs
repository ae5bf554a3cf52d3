//! Test helpers for FluentRouter tests.
//!
//! These run the assembled router in process with `oneshot()` and a fake
//! CAS server. Tests that need real sockets live in `tests/`.
//!
//! - Configuration: `create_base_config()`, `create_config_with_toml()`
//! - Routers: `create_test_router()`, `build_router()`
//! - Requests: `get_request()`, `get_with_cookie()`, `post_form()`
//! - Responses: `get_body_string()`, `location()`, `session_cookie()`

use crate::{
    CasAssertion, CasBackend, Config, Error, FluentRouter, HttpMiddleware, HttpMiddlewareConfig,
    Result,
};
use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::{collections::BTreeMap, sync::Arc};
use tower::ServiceExt;

#[cfg(test)]
pub(crate) mod middleware;

// ============================================================================
// Configuration Helpers
// ============================================================================

pub(crate) const TEST_SECRET: &str =
    "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef-test";

fn config_toml(additional_toml: &str) -> String {
    format!(
        r#"
host_url = "https://app.example.com"
session_secret = "{TEST_SECRET}"

[http]
bind_addr = "127.0.0.1"
port = 3000
max_payload_size_bytes = "1KiB"

[proxy_prefix_path]
uri = "/app"

[cas]
server_url = "https://cas.example.com"

[auth]
admin_group = "app-admins"

[static_files]
directory = "tests/fixtures/dist"
cache_max_age = 3600

[views]
directory = "views"

[browser]
apiUrl = "/app/api"

{additional_toml}
"#
    )
}

/// The configuration most tests run with: prefix `/app`, CAS at
/// `https://cas.example.com`, assets from `tests/fixtures/dist`.
pub(crate) fn create_base_config() -> Config {
    create_config_with_toml("")
}

/// The base configuration with additional tables appended.
pub(crate) fn create_config_with_toml(additional_toml: &str) -> Config {
    config_toml(additional_toml)
        .parse()
        .expect("Failed to parse test config TOML")
}

pub(crate) fn excluding(mut config: Config, middlewares: Vec<HttpMiddleware>) -> Config {
    config.http.middleware = Some(HttpMiddlewareConfig::Exclude(middlewares));
    config
}

// ============================================================================
// Fake CAS
// ============================================================================

/// Accepts `ST-valid` (jdoe) and `ST-admin` (an admin), fails `ST-down` as
/// if CAS were unreachable and rejects everything else.
pub(crate) struct FakeCas;

pub(crate) fn assertion(user: &str, groups: &[&str]) -> CasAssertion {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "mail".to_string(),
        vec![format!("{user}@example.com")],
    );
    if !groups.is_empty() {
        attributes.insert(
            "memberOf".to_string(),
            groups.iter().map(|g| g.to_string()).collect(),
        );
    }
    CasAssertion {
        user: user.to_string(),
        attributes,
        proxy_granting_ticket: None,
    }
}

impl CasBackend for FakeCas {
    fn validate<'a>(&'a self, ticket: &'a str, _service: &'a str) -> BoxFuture<'a, Result<CasAssertion>> {
        Box::pin(async move {
            match ticket {
                "ST-valid" => Ok(assertion("jdoe", &[])),
                "ST-admin" => Ok(assertion(
                    "boss",
                    &["CN=app-admins,OU=Groups,DC=example,DC=com"],
                )),
                "ST-down" => Err(Error::upstream("CAS server unreachable")),
                _ => Err(Error::authentication(format!(
                    "INVALID_TICKET: Ticket '{ticket}' not recognized"
                ))),
            }
        })
    }

    fn proxy_ticket<'a>(&'a self, _pgt: &'a str, target: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(format!("PT-{target}")) })
    }
}

// ============================================================================
// Router Helpers
// ============================================================================

/// The full pipeline with the default routes and the fake CAS.
pub(crate) fn create_test_router(config: Option<Config>) -> Router {
    build_router(config.unwrap_or_else(create_base_config), |router| router)
}

/// Like [`create_test_router`] with a hook to add routes or backends.
pub(crate) fn build_router(
    config: Config,
    customize: impl FnOnce(FluentRouter) -> FluentRouter,
) -> Router {
    let router = FluentRouter::new(config)
        .expect("Failed to create FluentRouter")
        .with_cas_backend(Arc::new(FakeCas));
    customize(router)
        .setup_pipeline()
        .expect("Failed to setup pipeline")
        .setup_default_routes()
        .into_inner()
        .expect("Failed to assemble router")
}

pub(crate) async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

// ============================================================================
// Request Helpers
// ============================================================================

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub(crate) fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Response Helpers
// ============================================================================

pub(crate) async fn get_body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub(crate) fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The `name=value` part of the session cookie set by `response`.
pub(crate) fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sso-web.sid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Signs in through the login callback and returns the session cookie.
pub(crate) async fn sign_in(app: &Router, ticket: &str) -> String {
    let response = send(app, get_request(&format!("/app/login?ticket={ticket}&nextUrl=/app/"))).await;
    assert_eq!(response.status(), 302, "login with {ticket} should redirect");
    session_cookie(&response).expect("login should set a session cookie")
}
