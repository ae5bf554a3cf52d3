//! Request handling: body parsing and request IDs.

use super::router::FluentRouter;
use crate::{Config, HttpMiddleware, RequestParsing, Result, state::AppState};

use {
    crate::utils::RequestIdGenerator,
    axum::Router,
    http::HeaderName,
    std::sync::Arc,
    tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
};

impl FluentRouter {
    /// Mounts the request parsing stage.
    ///
    /// Cookies are parsed for every request. JSON and form bodies are read
    /// up to `http.max_payload_size_bytes` and parsed into the request
    /// context, larger bodies are answered with `413 Payload Too Large`.
    ///
    /// ```toml
    /// [http]
    /// max_payload_size_bytes = "1MiB"  # Supports KiB, MiB, GiB
    /// ```
    pub fn setup_request_parsing(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::RequestParsing) {
            return Ok(self);
        }

        let limit = usize::try_from(self.config.http.max_payload_size_bytes.as_u64())
            .unwrap_or(usize::MAX);
        self.pipeline
            .push_stage(HttpMiddleware::RequestParsing, Arc::new(RequestParsing::new(limit)))?;
        Ok(self)
    }

    pub(crate) fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.config.is_middleware_enabled(middleware)
    }
}

/// Gives every request an `x-request-id` (UUIDv7 unless the client sent
/// one) and copies it to the response. Wraps the access log, so the request
/// span carries the ID.
pub(crate) fn apply_request_id(router: Router<AppState>, config: &Config) -> Router<AppState> {
    if !config.is_middleware_enabled(HttpMiddleware::RequestId) {
        return router;
    }

    let x_request_id = HeaderName::from_static("x-request-id");
    router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, RequestIdGenerator))
}
