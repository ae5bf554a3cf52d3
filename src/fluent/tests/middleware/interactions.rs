//! Tests for stages working together

use crate::fluent::tests::*;
use crate::{HttpMiddleware, HttpMiddlewareConfig};
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};

#[tokio::test]
async fn test_request_id_survives_login_redirect() {
    let app = create_test_router(None);
    let response = send(
        &app,
        Request::builder()
            .uri("/app/")
            .header("x-request-id", "trace-me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-me");
}

#[tokio::test]
async fn test_case_insensitive_login_flow() {
    let mut config = create_base_config();
    config.http.case_sensitive_routing = false;
    let app = create_test_router(Some(config));

    let response = send(&app, get_request("/APP/Login?ticket=ST-valid&nextUrl=/app/")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookie = session_cookie(&response).unwrap();

    let response = send(&app, get_with_cookie("/App/", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("/app/LOGINGATEWAY?nextUrl=/app/gateway")).await;
    assert_eq!(location(&response), "/app/gateway");
}

#[tokio::test]
async fn test_static_files_skip_body_parsing_limit() {
    // The payload limit belongs to a later stage, asset requests never
    // get that far.
    let app = create_test_router(None);
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/app/static/js/app.js")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("x".repeat(4096)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_and_language_cookies_together() {
    let app = create_test_router(None);
    let cookie = sign_in(&app, "ST-valid").await;
    let both = format!("{cookie}; language=en");

    let response = send(&app, get_with_cookie("/app/?l=en", &both)).await;
    assert!(get_body_string(response).await.contains("Signed in as"));
}

#[test]
fn test_minimal_pipeline_without_authentication_rejects_gated_defaults() {
    let mut config = create_base_config();
    config.http.middleware = Some(HttpMiddlewareConfig::Include(vec![
        HttpMiddleware::StaticAssets,
        HttpMiddleware::RequestParsing,
        HttpMiddleware::Locale,
    ]));

    let result = FluentRouter::new(config)
        .unwrap()
        .setup_pipeline()
        .unwrap()
        .setup_default_routes()
        .into_inner();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_minimal_pipeline_serves_ungated_routes() {
    let mut config = create_base_config();
    config.http.middleware = Some(HttpMiddlewareConfig::Include(vec![
        HttpMiddleware::StaticAssets,
        HttpMiddleware::Locale,
    ]));

    let app = FluentRouter::new(config)
        .unwrap()
        .setup_pipeline()
        .unwrap()
        .route(crate::RouteSpec::get(
            crate::RouteId::Custom("app.ping"),
            "/app/ping",
            axum::routing::get(|| async { "pong" }),
        ))
        .into_inner()
        .unwrap();

    let response = send(&app, get_request("/app/ping")).await;
    assert_eq!(get_body_string(response).await, "pong");
    let response = send(&app, get_request("/app/static/css/site.css")).await;
    assert_eq!(response.status(), StatusCode::OK);
    // Request IDs are off too.
    assert!(response.headers().get("x-request-id").is_none());
}
