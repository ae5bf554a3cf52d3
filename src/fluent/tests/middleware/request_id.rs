//! Tests for request IDs
//!
//! `SetRequestIdLayer` runs outside `PropagateRequestIdLayer`, so generated
//! IDs reach the response as well as client-provided ones.

use crate::HttpMiddleware;
use crate::fluent::tests::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};

fn request_id(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_request_id_preserves_existing_header() {
    let app = create_test_router(None);
    let custom_id = "custom-request-id-12345";

    let response = send(
        &app,
        Request::builder()
            .uri("/app/_monitor")
            .header("x-request-id", custom_id)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(request_id(&response).as_deref(), Some(custom_id));
}

#[tokio::test]
async fn test_request_id_is_generated_as_uuid_v7() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/_monitor")).await;

    let id = request_id(&response).expect("generated request id should be propagated");
    let uuid = uuid::Uuid::parse_str(&id).expect("request id should be a UUID");
    assert_eq!(uuid.get_version_num(), 7);
}

#[tokio::test]
async fn test_request_ids_differ_between_requests() {
    let app = create_test_router(None);
    let first = request_id(&send(&app, get_request("/app/_monitor")).await);
    let second = request_id(&send(&app, get_request("/app/_monitor")).await);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_request_id_on_error_responses() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/static/missing.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(request_id(&response).is_some());
}

#[tokio::test]
async fn test_request_id_can_be_excluded() {
    let config = excluding(create_base_config(), vec![HttpMiddleware::RequestId]);
    let app = create_test_router(Some(config));
    let response = send(&app, get_request("/app/_monitor")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(request_id(&response).is_none());
}
