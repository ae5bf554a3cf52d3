use crate::fluent::tests::*;
use crate::{ParsedBody, RequestContext, RouteId, RouteSpec};
use axum::{http::StatusCode, routing::post};

async fn echo(ctx: RequestContext) -> String {
    match &ctx.body {
        Some(ParsedBody::Json(value)) => format!("json {value}"),
        Some(form @ ParsedBody::Form(_)) => format!("form {}", form.field("name").unwrap_or("-")),
        None => "empty".to_string(),
    }
}

fn with_echo(router: FluentRouter) -> FluentRouter {
    router.route(RouteSpec::post(
        RouteId::Custom("app.echo"),
        "/app/echo",
        post(echo),
    ))
}

#[tokio::test]
async fn test_json_body_reaches_handler() {
    let app = build_router(create_base_config(), with_echo);
    let response = send(&app, post_json("/app/echo", r#"{"name":"jdoe"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_string(response).await, r#"json {"name":"jdoe"}"#);
}

#[tokio::test]
async fn test_form_body_reaches_handler() {
    let app = build_router(create_base_config(), with_echo);
    let response = send(&app, post_form("/app/echo", "name=J%C3%B6rgen+D")).await;
    assert_eq!(get_body_string(response).await, "form Jörgen D");
}

#[tokio::test]
async fn test_empty_body_is_none() {
    let app = build_router(create_base_config(), with_echo);
    let response = send(&app, post_json("/app/echo", "")).await;
    assert_eq!(get_body_string(response).await, "empty");
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = build_router(create_base_config(), with_echo);
    let body = format!(r#"{{"name":"{}"}}"#, "x".repeat(2048));
    let response = send(&app, post_json("/app/echo", &body)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = build_router(create_base_config(), with_echo);
    let response = send(&app, post_json("/app/echo", r#"{"name": "#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = get_body_string(response).await;
    assert!(body.contains("malformed JSON body"), "body: {body}");
}
