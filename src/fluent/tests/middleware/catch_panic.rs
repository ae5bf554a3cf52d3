//! Tests for panic catching

use crate::fluent::tests::*;
use crate::{HttpMiddleware, RouteId, RouteSpec};
use axum::{http::StatusCode, routing::get};

fn panicking_route(router: FluentRouter) -> FluentRouter {
    router.route(RouteSpec::get(
        RouteId::Custom("app.panic"),
        "/app/panic",
        get(|| async {
            panic!("Test panic!");
            #[allow(unreachable_code)]
            "This will never be reached"
        }),
    ))
}

#[tokio::test]
async fn test_panic_becomes_500() {
    let app = build_router(create_base_config(), panicking_route);
    let response = send(&app, get_request("/app/panic")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(get_body_string(response).await, "Internal Server Error");
}

#[tokio::test]
async fn test_panic_message_is_sent_to_channel() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let app = build_router(create_base_config(), |router| {
        panicking_route(router).with_panic_notification_channel(tx)
    });

    let response = send(&app, get_request("/app/panic")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let msg = rx.try_recv().expect("panic should be reported");
    assert_eq!(msg, "Service panicked: Test panic!");
}

#[tokio::test]
async fn test_normal_requests_are_untouched() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let app = build_router(create_base_config(), |router| {
        router.with_panic_notification_channel(tx)
    });

    let response = send(&app, get_request("/app/_monitor")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
#[should_panic(expected = "Test panic!")]
async fn test_excluded_catch_panic_lets_panics_through() {
    let config = excluding(create_base_config(), vec![HttpMiddleware::CatchPanic]);
    let app = build_router(config, panicking_route);
    send(&app, get_request("/app/panic")).await;
}
