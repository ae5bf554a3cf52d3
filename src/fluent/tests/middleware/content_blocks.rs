use crate::fluent::tests::*;
use crate::{BlockCache, Blocks, HttpMiddleware, MemoryBlockCache, RequestContext, RouteId, RouteSpec};
use axum::{http::StatusCode, routing::get};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing_test::traced_test;

// Nothing listens on the discard port, fetches fail fast.
const BLOCKS_TOML: &str = r#"
[block_api]
block_url = "http://127.0.0.1:9/blocks/"
timeout = "2s"

[block_api.blocks]
footer = "1.202278"
"#;

fn footer(html: &str) -> Blocks {
    Blocks(BTreeMap::from([("footer".to_string(), html.to_string())]))
}

async fn show_footer(ctx: RequestContext) -> String {
    ctx.blocks.get("footer").unwrap_or("no footer").to_string()
}

fn with_footer_route(router: FluentRouter) -> FluentRouter {
    router.route(RouteSpec::get(
        RouteId::Custom("app.footer"),
        "/app/footer",
        get(show_footer),
    ))
}

async fn router_with_cache(cache: Arc<MemoryBlockCache>) -> axum::Router {
    build_router(create_config_with_toml(BLOCKS_TOML), move |router| {
        with_footer_route(router.with_block_cache(cache).unwrap())
    })
}

#[test]
fn test_content_blocks_stage_mounted_with_block_url() {
    let router = FluentRouter::new(create_config_with_toml(BLOCKS_TOML))
        .unwrap()
        .setup_pipeline()
        .unwrap();
    let stages = router.stages();
    let blocks = stages.iter().position(|s| *s == HttpMiddleware::ContentBlocks);
    let auth = stages.iter().position(|s| *s == HttpMiddleware::Authentication);
    let crawler = stages.iter().position(|s| *s == HttpMiddleware::CrawlerRedirect);
    assert!(blocks.is_some());
    assert!(auth < blocks && blocks < crawler);
}

#[tokio::test]
async fn test_cached_blocks_reach_handler() {
    let cache = Arc::new(MemoryBlockCache::new(Duration::from_secs(60)));
    cache.put("sv", footer("<p>Sidfot</p>")).await.unwrap();
    cache.put("en", footer("<p>Footer</p>")).await.unwrap();
    let app = router_with_cache(cache).await;

    let response = send(&app, get_request("/app/footer")).await;
    assert_eq!(get_body_string(response).await, "<p>Sidfot</p>");

    let response = send(&app, get_request("/app/footer?l=en")).await;
    assert_eq!(get_body_string(response).await, "<p>Footer</p>");
}

#[tokio::test]
async fn test_blocks_render_in_layout() {
    let cache = Arc::new(MemoryBlockCache::new(Duration::from_secs(60)));
    cache.put("sv", footer("<nav id=\"cortina\">Länkar</nav>")).await.unwrap();
    let app = router_with_cache(cache).await;

    let cookie = sign_in(&app, "ST-valid").await;
    let response = send(&app, get_with_cookie("/app/", &cookie)).await;
    let body = get_body_string(response).await;
    assert!(body.contains("<nav id=\"cortina\">Länkar</nav>"), "body: {body}");
}

#[tokio::test]
#[traced_test]
async fn test_unreachable_block_service_leaves_blocks_empty() {
    let cache = Arc::new(MemoryBlockCache::new(Duration::from_secs(60)));
    let app = router_with_cache(cache).await;

    let response = send(&app, get_request("/app/footer")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_string(response).await, "no footer");
    assert!(logs_contain("content blocks unavailable"));
}
