use crate::HttpMiddleware;
use crate::fluent::tests::*;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use tracing_test::traced_test;

const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

fn from_agent(uri: &str, user_agent: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, user_agent)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
#[traced_test]
async fn test_crawler_gets_canonical_page() {
    let app = create_test_router(None);
    let response = send(&app, from_agent("/app/", GOOGLEBOT)).await;

    // No CAS redirect and no session for bots.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());

    let body = get_body_string(response).await;
    assert!(
        body.contains(r#"<link rel="canonical" href="https://app.example.com/app/">"#),
        "body: {body}"
    );
    assert!(logs_contain("crawler detected"));
}

#[tokio::test]
async fn test_browser_is_not_short_circuited() {
    let app = create_test_router(None);
    let response = send(
        &app,
        from_agent("/app/", "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_crawler_still_gets_static_files() {
    let app = create_test_router(None);
    let response = send(&app, from_agent("/app/static/js/app.js", GOOGLEBOT)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_string(response).await.len() > 0);
}

#[tokio::test]
async fn test_configured_crawler_pattern() {
    let config = create_config_with_toml(
        r#"
[crawler]
user_agents = ["SiteImprove"]
"#,
    );
    let app = create_test_router(Some(config));
    let response = send(&app, from_agent("/app/gateway", "siteimprove.com/1.0")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_string(response).await.contains("/app/gateway"));
}

#[tokio::test]
async fn test_crawler_stage_can_be_excluded() {
    let config = excluding(create_base_config(), vec![HttpMiddleware::CrawlerRedirect]);
    let app = create_test_router(Some(config));
    let response = send(&app, from_agent("/app/", GOOGLEBOT)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}
