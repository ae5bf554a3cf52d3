use {
    crate::{RequestContext, Result, routes::RouteIndex, state::AppState},
    axum::{
        Json,
        extract::State,
        response::{Html, IntoResponse, Response},
    },
    http::{StatusCode, header},
    std::fmt::Write,
};

/// `GET {prefix}/_monitor`
pub async fn monitor(State(state): State<AppState>) -> Response {
    let mut checks = Vec::new();

    if let Some(blocks) = &state.blocks {
        let cache = blocks.cache();
        checks.push((format!("BLOCK_CACHE ({})", cache.name()), cache.health().await));
    }
    let directory = state.auth.directory();
    checks.push((
        format!("DIRECTORY ({})", directory.name()),
        directory.health().await,
    ));

    let healthy = checks.iter().all(|(_, result)| result.is_ok());
    let mut body = format!(
        "APPLICATION_STATUS: {}\n",
        if healthy { "OK" } else { "ERROR" }
    );
    for (name, result) in &checks {
        let _ = match result {
            Ok(()) => writeln!(body, "{name}: OK"),
            Err(e) => writeln!(body, "{name}: ERROR {e}"),
        };
    }
    if !healthy {
        tracing::warn!(status = %body.trim_end(), "monitor check failed");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, body).into_response()
}

/// `GET {prefix}/_about`
pub async fn about(State(state): State<AppState>, ctx: RequestContext) -> Result<Html<String>> {
    let config = &state.config;
    let mut context = tera::Context::new();
    context.insert("name", env!("CARGO_PKG_NAME"));
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert("environment", &state.environment);
    context.insert("host_url", config.host());
    context.insert("prefix", config.prefix());
    context.insert(
        "started",
        &humantime::format_rfc3339_seconds(state.started).to_string(),
    );
    context.insert("lang", ctx.language().unwrap_or(&config.locale.default));
    state.views.html("system/about", &context)
}

/// `GET {prefix}/_paths`
pub async fn paths(State(state): State<AppState>) -> Json<RouteIndex> {
    Json(state.paths())
}

/// `GET /robots.txt`
pub async fn robots() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "User-agent: *\nDisallow: /\n",
    )
}
