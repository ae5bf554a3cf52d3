use crate::fluent::tests::*;
use axum::http::{StatusCode, header};

fn cache_control(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_static_files_served_under_prefix() {
    let app = create_test_router(None);

    let response = send(&app, get_request("/app/static/js/app.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_control(&response), Some("public, max-age=3600"));

    let response = send(&app, get_request("/app/static/css/site.css")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/css")
    );
}

#[tokio::test]
async fn test_html_assets_are_revalidated() {
    let app = create_test_router(None);

    let response = send(&app, get_request("/app/static/js/components/widget.html")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_control(&response), Some("no-cache"));

    // Directory requests fall back to index.html.
    let response = send(&app, get_request("/app/static/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_control(&response), Some("no-cache"));
    assert!(get_body_string(response).await.contains("static index"));
}

#[tokio::test]
async fn test_directory_redirect_stays_under_prefix() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/static/js")).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/app/static/js/");

    let response = send(&app, get_request("/app/static/js?v=2")).await;
    assert_eq!(location(&response), "/app/static/js/?v=2");
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/static/js/missing.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = serde_json::from_str(&get_body_string(response).await).unwrap();
    assert_eq!(body["error_code"], "NOT_FOUND");
    assert_eq!(body["message"], "File not found: /app/static/js/missing.js");
}

#[tokio::test]
async fn test_static_files_never_reach_login_gate() {
    // Anonymous visitors get assets without being sent to CAS.
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/static/js/app.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_browser_config_script() {
    let app = create_test_router(None);
    let response = send(&app, get_request("/app/static/browserConfig")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/javascript; charset=utf-8"
    );
    assert_eq!(cache_control(&response), Some("no-cache"));

    let body = get_body_string(response).await;
    assert!(body.starts_with(r#"window.config = {"apiUrl":"/app/api"};"#), "body: {body}");
    assert!(body.contains("window.paths = {"));
    assert!(body.contains(r#""system.monitor":{"method":"GET","uri":"/app/_monitor"}"#), "body: {body}");
}

#[tokio::test]
async fn test_paths_outside_static_prefix_pass_through() {
    let app = create_test_router(None);
    // A file in the dist directory is not reachable outside the gate.
    let response = send(&app, get_request("/app/js/app.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = get_body_string(response).await;
    assert!(!body.contains("File not found"));
}
