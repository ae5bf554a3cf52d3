use crate::fluent::tests::*;
use crate::{Locale, LocaleSource, RequestContext, RouteId, RouteSpec};
use axum::{
    Extension,
    body::Body,
    http::{Request, header},
    routing::get,
};

fn about_with(name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri("/app/_about")
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_default_language_is_swedish() {
    let app = create_test_router(None);
    let body = get_body_string(send(&app, get_request("/app/_about")).await).await;
    assert!(body.contains("Om applikationen"), "body: {body}");
    assert!(body.contains(r#"<html lang="sv">"#));
}

#[tokio::test]
async fn test_language_cookie() {
    let app = create_test_router(None);
    let response = send(&app, about_with(header::COOKIE.as_str(), "language=en")).await;
    let body = get_body_string(response).await;
    assert!(body.contains("About the application"), "body: {body}");
}

#[tokio::test]
async fn test_accept_language() {
    let app = create_test_router(None);
    let response = send(
        &app,
        about_with(header::ACCEPT_LANGUAGE.as_str(), "en-GB,en;q=0.9,sv;q=0.5"),
    )
    .await;
    assert!(get_body_string(response).await.contains("About the application"));
}

#[tokio::test]
async fn test_query_beats_cookie() {
    let app = create_test_router(None);
    let response = send(
        &app,
        Request::builder()
            .uri("/app/_about?l=sv")
            .header(header::COOKIE, "language=en")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(get_body_string(response).await.contains("Om applikationen"));
}

#[tokio::test]
async fn test_locale_reaches_handlers() {
    let app = build_router(create_base_config(), |router| {
        router.route(RouteSpec::get(
            RouteId::Custom("app.lang"),
            "/app/lang",
            get(|ctx: RequestContext, Extension(locale): Extension<Locale>| async move {
                format!("{} {}", ctx.language().unwrap_or("-"), locale.source == LocaleSource::Cookie)
            }),
        ))
    });
    let response = send(
        &app,
        Request::builder()
            .uri("/app/lang")
            .header(header::COOKIE, "language=en")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(get_body_string(response).await, "en true");
}

fn language_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("language="))
        .map(str::to_string)
}

#[tokio::test]
async fn test_query_language_is_remembered() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/_about?l=en")).await;
    let cookie = language_cookie(&response).expect("?l= should set the language cookie");
    assert!(cookie.starts_with("language=en;"), "{cookie}");
    assert!(cookie.contains("Path=/app"));

    // The next request without ?l= keeps English.
    let pair = cookie.split(';').next().unwrap();
    let response = send(&app, get_with_cookie("/app/_about", pair)).await;
    assert!(language_cookie(&response).is_none());
    assert!(get_body_string(response).await.contains("About the application"));
}

#[tokio::test]
async fn test_unsupported_query_language_sets_no_cookie() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/_about?l=de")).await;
    assert!(language_cookie(&response).is_none());
}
