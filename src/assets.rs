//!
//! The static asset gate at `{prefix}/static`.
//!
//! Everything below the gate is answered here: files from the dist
//! directory, the generated `browserConfig` script, or a 404. Requests
//! outside the gate pass through untouched.
//!

use {
    crate::{
        Config, Error,
        pipeline::{Outcome, Stage},
        routes::RouteIndex,
        utils::path_is_under,
    },
    axum::{
        body::Body,
        extract::Request,
        response::{IntoResponse, Response},
    },
    futures_util::future::BoxFuture,
    http::{HeaderValue, StatusCode, Uri, header},
    serde_json::{Map, Value},
    std::sync::{Arc, OnceLock},
    tower::{Layer, ServiceExt},
    tower_http::{
        services::ServeDir,
        set_header::{MakeHeaderValue, SetResponseHeader, SetResponseHeaderLayer},
    },
};

pub const BROWSER_CONFIG_PATH: &str = "/browserConfig";

/// `Cache-Control` for served files: HTML is always revalidated, other
/// assets get `public, max-age=N` when configured.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    max_age: Option<u64>,
}

impl CachePolicy {
    pub fn new(max_age: Option<u64>) -> Self {
        CachePolicy { max_age }
    }

    fn header_for(&self, status: StatusCode, content_type: Option<&str>) -> Option<HeaderValue> {
        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            return None;
        }
        if content_type.is_some_and(|ct| ct.starts_with("text/html")) {
            return Some(HeaderValue::from_static("no-cache"));
        }
        let max_age = self.max_age?;
        HeaderValue::from_str(&format!("public, max-age={max_age}")).ok()
    }
}

impl<B> MakeHeaderValue<Response<B>> for CachePolicy {
    fn make_header_value(&mut self, response: &Response<B>) -> Option<HeaderValue> {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        self.header_for(response.status(), content_type)
    }
}

pub struct StaticAssets {
    static_prefix: String,
    browser: Map<String, Value>,
    paths: Arc<OnceLock<RouteIndex>>,
    files: SetResponseHeader<ServeDir, CachePolicy>,
}

impl StaticAssets {
    pub fn new(config: &Config, paths: Arc<OnceLock<RouteIndex>>) -> Self {
        let serve_dir = ServeDir::new(&config.static_files.directory)
            .append_index_html_on_directories(true)
            .precompressed_br()
            .precompressed_gzip();
        let files = SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            CachePolicy::new(config.static_files.cache_max_age),
        )
        .layer(serve_dir);

        StaticAssets {
            static_prefix: config.static_prefix(),
            browser: config.browser.clone(),
            paths,
            files,
        }
    }

    /// `window.config` and `window.paths` for the browser bundle.
    pub fn browser_config(&self) -> String {
        let config = serde_json::to_string(&self.browser).unwrap_or_else(|_| "{}".into());
        let paths = self
            .paths
            .get()
            .and_then(|index| serde_json::to_string(index).ok())
            .unwrap_or_else(|| "{}".into());
        format!("window.config = {config}; window.paths = {paths};")
    }

    async fn serve(&self, request: Request) -> Outcome {
        let original = request.uri().clone();
        let (mut parts, body) = request.into_parts();

        let rest = original
            .path()
            .strip_prefix(&self.static_prefix)
            .unwrap_or_default();
        let rest = if rest.is_empty() { "/" } else { rest };
        let target = match original.query() {
            Some(query) => format!("{rest}?{query}"),
            None => rest.to_string(),
        };
        parts.uri = match target.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => return Outcome::Failed(Error::invalid_input(format!("bad asset path: {e}"))),
        };

        let request = Request::from_parts(parts, body);
        let response = match self.files.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Outcome::Failed(Error::not_found(format!("File not found: {original}")));
        }
        let mut response = response.map(Body::new);
        if response.status().is_redirection() {
            self.relocate(&mut response);
        }
        Outcome::Handled(response)
    }

    /// `ServeDir` redirects directories to their trailing-slash form using
    /// the path it was given, which lacks the static prefix.
    fn relocate(&self, response: &mut Response) {
        let Some(location) = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with('/'))
        else {
            return;
        };
        let relocated = format!("{}{location}", self.static_prefix);
        if let Ok(value) = HeaderValue::from_str(&relocated) {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
}

impl Stage for StaticAssets {
    fn name(&self) -> &'static str {
        "static-assets"
    }

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let path = request.uri().path();
            if !path_is_under(path, &self.static_prefix) {
                return Outcome::Declined(request);
            }

            if path.strip_prefix(self.static_prefix.as_str()) == Some(BROWSER_CONFIG_PATH) {
                let response = (
                    [
                        (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
                        (header::CACHE_CONTROL, "no-cache"),
                    ],
                    self.browser_config(),
                )
                    .into_response();
                return Outcome::Handled(response);
            }

            self.serve(request).await
        })
    }
}
