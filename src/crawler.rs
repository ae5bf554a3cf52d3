//!
//! Crawler short-circuit.
//!
//! Search engine bots get a small session-free page with a canonical link
//! instead of being bounced through CAS by the login gates.
//!

use {
    crate::{
        CrawlerConfig, Result,
        pipeline::{Outcome, Stage},
        utils::path_is_under,
        views::Renderer,
    },
    axum::{
        extract::Request,
        response::{Html, IntoResponse},
    },
    futures_util::future::BoxFuture,
    http::header::USER_AGENT,
    regex::{Regex, RegexBuilder},
    std::sync::LazyLock,
};

static BUILTIN_CRAWLERS: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"bot|crawl|spider|slurp|baiduspider|yandex|facebookexternalhit|embedly|quora link preview|outbrain|pinterest|vkshare|w3c_validator|bingpreview|archive\.org_bot",
    )
    .case_insensitive(true)
    .build()
    .unwrap()
});

/// Matches the built-in list of well-known crawlers.
///
/// ```
/// use sso_web::is_crawler;
///
/// assert!(is_crawler("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"));
/// assert!(!is_crawler("Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"));
/// ```
pub fn is_crawler(user_agent: &str) -> bool {
    BUILTIN_CRAWLERS.is_match(user_agent)
}

/// The built-in list plus the `[crawler] user_agents` patterns.
#[derive(Debug, Clone)]
pub struct CrawlerDetector {
    extra: Vec<Regex>,
}

impl CrawlerDetector {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let extra = config
            .user_agents
            .iter()
            .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| crate::Error::config(format!("invalid crawler pattern: {e}")))?;
        Ok(CrawlerDetector { extra })
    }

    pub fn is_crawler(&self, user_agent: &str) -> bool {
        is_crawler(user_agent) || self.extra.iter().any(|re| re.is_match(user_agent))
    }
}

pub struct CrawlerStage {
    detector: CrawlerDetector,
    views: Renderer,
    host: String,
    prefix: String,
    static_prefix: String,
    language: String,
}

impl CrawlerStage {
    pub fn new(
        detector: CrawlerDetector,
        views: Renderer,
        config: &crate::Config,
    ) -> Self {
        CrawlerStage {
            detector,
            views,
            host: config.host().to_string(),
            prefix: config.prefix().to_string(),
            static_prefix: config.static_prefix(),
            language: config.locale.default.clone(),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        path_is_under(path, &self.prefix) && !path_is_under(path, &self.static_prefix)
    }

    /// The page's absolute URL, serialized by `Url` so the request path is
    /// percent-encoded before it lands in an attribute.
    fn canonical(&self, path: &str) -> Result<String> {
        Ok(url::Url::parse(&format!("{}{}", self.host, path))?.into())
    }

    fn render(&self, path: &str) -> Result<Html<String>> {
        let mut context = tera::Context::new();
        context.insert("canonical", &self.canonical(path)?);
        context.insert("lang", &self.language);
        self.views.html("system/crawler", &context)
    }
}

impl Stage for CrawlerStage {
    fn name(&self) -> &'static str {
        "crawler-redirect"
    }

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let path = request.uri().path();
            if !self.applies_to(path) {
                return Outcome::Declined(request);
            }

            let crawler = request
                .headers()
                .get(USER_AGENT)
                .and_then(|ua| ua.to_str().ok())
                .is_some_and(|ua| self.detector.is_crawler(ua));
            if !crawler {
                return Outcome::Declined(request);
            }

            tracing::debug!(path = %path, "crawler detected, serving canonical page");
            match self.render(path) {
                Ok(page) => Outcome::Handled(page.into_response()),
                Err(e) => Outcome::Failed(e),
            }
        })
    }
}
