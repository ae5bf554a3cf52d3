use {
    crate::{Error, Result},
    serde::Deserialize,
    std::fmt,
};

///
/// Selects which pipeline stages are mounted.
///
/// ```toml
/// [http.middleware]
/// exclude = ["content-blocks", "crawler-redirect"]
/// ```
///
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMiddlewareConfig {
    Include(Vec<HttpMiddleware>),
    Exclude(Vec<HttpMiddleware>),
}

impl HttpMiddlewareConfig {
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        match self {
            HttpMiddlewareConfig::Include(list) => list.contains(&middleware),
            HttpMiddlewareConfig::Exclude(list) => !list.contains(&middleware),
        }
    }

    /// Validates middleware dependencies are satisfied.
    ///
    /// # Dependencies
    ///
    /// - `Authentication` requires `Session` (the principal lives in the session)
    pub fn validate(&self) -> Result<()> {
        if self.is_enabled(HttpMiddleware::Authentication)
            && !self.is_enabled(HttpMiddleware::Session)
        {
            return Err(Error::config(
                "Authentication requires Session. Remove 'session' from the exclude list or add both to the include list.",
            ));
        }
        Ok(())
    }
}

/// A pipeline stage or ambient layer that can be switched on or off.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum HttpMiddleware {
    AccessLog,
    StaticAssets,
    RequestParsing,
    Session,
    Authentication,
    ContentBlocks,
    CrawlerRedirect,
    Locale,
    RequestId,
    CatchPanic,
}

impl HttpMiddleware {
    /// The pipeline stages in the order every request traverses them.
    pub const PIPELINE: [HttpMiddleware; 8] = [
        HttpMiddleware::AccessLog,
        HttpMiddleware::StaticAssets,
        HttpMiddleware::RequestParsing,
        HttpMiddleware::Session,
        HttpMiddleware::Authentication,
        HttpMiddleware::ContentBlocks,
        HttpMiddleware::CrawlerRedirect,
        HttpMiddleware::Locale,
    ];

    /// Position in [`Self::PIPELINE`], `None` for the ambient layers.
    pub fn position(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|m| *m == self)
    }

    pub fn name(self) -> &'static str {
        match self {
            HttpMiddleware::AccessLog => "access-log",
            HttpMiddleware::StaticAssets => "static-assets",
            HttpMiddleware::RequestParsing => "request-parsing",
            HttpMiddleware::Session => "session",
            HttpMiddleware::Authentication => "authentication",
            HttpMiddleware::ContentBlocks => "content-blocks",
            HttpMiddleware::CrawlerRedirect => "crawler-redirect",
            HttpMiddleware::Locale => "locale",
            HttpMiddleware::RequestId => "request-id",
            HttpMiddleware::CatchPanic => "catch-panic",
        }
    }
}

impl fmt::Display for HttpMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
