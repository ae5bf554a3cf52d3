//!
//! Per-request state shared between pipeline stages and handlers.
//!
//! Each stage annotates the [`RequestContext`] stored in the request
//! extensions. Handlers extract a copy of it like any other axum extractor.
//!

use {
    crate::{Blocks, Locale, Principal},
    axum::extract::FromRequestParts,
    http::{Request, request::Parts},
    serde_json::Value,
    std::{collections::BTreeMap, convert::Infallible},
    tower_sessions::Session,
};

/// A request body decoded by the request-parsing stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

impl ParsedBody {
    /// A top-level string field of a JSON object, or the first form value
    /// with that name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            ParsedBody::Json(value) => value.get(name).and_then(Value::as_str),
            ParsedBody::Form(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub body: Option<ParsedBody>,
    pub cookies: BTreeMap<String, String>,
    pub session: Option<Session>,
    pub principal: Option<Principal>,
    pub locale: Option<Locale>,
    pub blocks: Blocks,
}

impl RequestContext {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// The resolved language, when the locale stage ran.
    pub fn language(&self) -> Option<&str> {
        self.locale.as_ref().map(Locale::as_str)
    }
}

/// The context of `request`, inserted empty on first access.
pub fn context_mut<B>(request: &mut Request<B>) -> &mut RequestContext {
    request
        .extensions_mut()
        .get_or_insert_default::<RequestContext>()
}

pub(crate) fn context<B>(request: &Request<B>) -> Option<&RequestContext> {
    request.extensions().get::<RequestContext>()
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
