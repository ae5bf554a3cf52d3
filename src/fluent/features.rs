//! Site features: static assets, sessions, content blocks, crawlers, locale
//! and case-insensitive routing.

use super::router::FluentRouter;
use crate::{
    ContentBlocksStage, CrawlerDetector, CrawlerStage, Error, HttpMiddleware, LocaleStage, Result,
    StaticAssets, context::context_mut, utils::path_is_under,
};

use {
    axum::{
        Router,
        extract::Request,
        middleware::{self, Next},
        response::Response,
    },
    http::{Uri, uri::PathAndQuery},
    std::sync::Arc,
    tower::ServiceBuilder,
    tower_sessions::{
        Expiry, MemoryStore, Session, SessionManagerLayer, SessionStore,
        cookie::{Key, time::Duration as CookieDuration},
    },
};

impl FluentRouter {
    /// Mounts the static asset stage for `{prefix}/static`.
    ///
    /// Files come from `static_files.directory`, precompressed `.br` and
    /// `.gz` siblings are preferred when the client accepts them. HTML is
    /// served with `Cache-Control: no-cache`, everything else with
    /// `static_files.max_age` when set. `{prefix}/static/browserConfig`
    /// is generated from `[browser]` and the route table.
    pub fn setup_static_assets(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::StaticAssets) {
            return Ok(self);
        }

        let assets = StaticAssets::new(&self.config, self.state.paths.clone());
        self.pipeline
            .push_stage(HttpMiddleware::StaticAssets, Arc::new(assets))?;
        Ok(self)
    }

    /// Mounts cookie sessions backed by an in-memory store.
    pub fn setup_session(self) -> Result<Self> {
        self.setup_session_with_store(MemoryStore::default())
    }

    /// Mounts cookie sessions backed by `store`.
    ///
    /// The cookie is signed with `session_secret` and expires after
    /// `session.inactivity_timeout` without a request. Sessions are only
    /// written to the store once something is put in them.
    ///
    /// ```toml
    /// session_secret = "{{ SESSION_SECRET }}"
    ///
    /// [session]
    /// cookie_name = "sso-web.sid"
    /// secure = true
    /// same_site = "lax"
    /// inactivity_timeout = "1h"
    /// ```
    pub fn setup_session_with_store<Store>(mut self, store: Store) -> Result<Self>
    where
        Store: SessionStore + Clone,
    {
        if !self.is_middleware_enabled(HttpMiddleware::Session) {
            return Ok(self);
        }

        let key = Key::try_from(self.config.session_secret.0.as_bytes())
            .map_err(|e| Error::config(format!("session_secret cannot be used as a key: {e}")))?;

        let session = &self.config.session;
        let inactivity = i64::try_from(session.inactivity_timeout.as_secs()).unwrap_or(i64::MAX);
        let session_layer = SessionManagerLayer::new(store)
            .with_name(session.cookie_name.clone())
            .with_secure(session.secure)
            .with_same_site(session.same_site.into())
            .with_http_only(true)
            .with_expiry(Expiry::OnInactivity(CookieDuration::seconds(inactivity)))
            .with_signed(key);

        self.pipeline.push_layer(HttpMiddleware::Session, move |router| {
            router
                .layer(middleware::from_fn(attach_session))
                .layer(session_layer)
        })?;
        Ok(self)
    }

    /// Mounts the content block stage. Pages under the prefix get the
    /// `[block_api]` fragments for their locale, an unreachable block
    /// service only leaves them empty.
    pub fn setup_content_blocks(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::ContentBlocks) {
            return Ok(self);
        }
        let Some(fetcher) = self.state.blocks.clone() else {
            tracing::debug!("block_api.block_url is not set, content blocks are off");
            return Ok(self);
        };

        let stage = ContentBlocksStage::new(fetcher, &self.config);
        self.pipeline
            .push_stage(HttpMiddleware::ContentBlocks, Arc::new(stage))?;
        Ok(self)
    }

    /// Mounts the crawler stage. Search engine bots get a session-free
    /// rendering of the page they asked for and never reach a gate.
    pub fn setup_crawler_redirect(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::CrawlerRedirect) {
            return Ok(self);
        }

        let detector = CrawlerDetector::new(&self.config.crawler)?;
        let stage = CrawlerStage::new(detector, self.state.views.clone(), &self.config);
        self.pipeline
            .push_stage(HttpMiddleware::CrawlerRedirect, Arc::new(stage))?;
        Ok(self)
    }

    /// Mounts the locale stage, the last one before the routes.
    pub fn setup_locale(mut self) -> Result<Self> {
        if !self.is_middleware_enabled(HttpMiddleware::Locale) {
            return Ok(self);
        }

        let stage = LocaleStage::new(self.config.locale.clone(), self.config.prefix());
        self.pipeline
            .push_stage(HttpMiddleware::Locale, Arc::new(stage))?;
        Ok(self)
    }
}

async fn attach_session(mut request: Request, next: Next) -> Response {
    if let Some(session) = request.extensions().get::<Session>().cloned() {
        context_mut(&mut request).session = Some(session);
    }
    next.run(request).await
}

/// Routes `router` with lower-cased request paths. Paths under
/// `static_prefix` keep their case, file names are case-sensitive.
pub(crate) fn fold_path_case(router: Router, static_prefix: String) -> Router {
    let folded = ServiceBuilder::new()
        .map_request(move |mut request: Request| {
            lowercase_path(&mut request, &static_prefix);
            request
        })
        .service(router);
    Router::new().fallback_service(folded)
}

fn lowercase_path(request: &mut Request, static_prefix: &str) {
    let path = request.uri().path();
    let lowered = path.to_lowercase();
    if lowered == path || path_is_under(path, static_prefix) {
        return;
    }

    let path_and_query = match request.uri().query() {
        Some(query) => format!("{lowered}?{query}"),
        None => lowered,
    };
    let Ok(path_and_query) = PathAndQuery::try_from(path_and_query) else {
        return;
    };
    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }
}
