//! The access log.

use super::router::FluentRouter;
use crate::{HttpMiddleware, Result};

use {
    axum::body::Body,
    http::Request,
    tower_http::trace::{DefaultOnResponse, TraceLayer},
    tracing::Level,
};

impl FluentRouter {
    /// Mounts the access log as the outermost pipeline stage.
    ///
    /// Every request gets an `http_request` span with the method, URI and
    /// request ID. The `user` field is filled in by the authentication
    /// stage. Responses are logged at INFO with status and latency.
    ///
    /// ```toml
    /// [logging.access_log]
    /// enabled = true  # Default
    /// ```
    pub fn setup_access_log(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::AccessLog)
            || !self.config.logging.access_log.enabled
        {
            return Ok(self);
        }

        self.pipeline.push_layer(HttpMiddleware::AccessLog, |router| {
            router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");

                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                            user = tracing::field::Empty,
                        )
                    })
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
        })?;
        Ok(self)
    }
}
