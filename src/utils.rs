//!
//! Utility types and functions shared across the service.
//!
//! - [`Sensitive`] hides secrets in debug output and zeroes them on drop
//! - [`RequestIdGenerator`] generates or preserves request IDs
//! - [`replace_handlebars_with_env`] substitutes `{{ VAR }}` placeholders in config text
//! - [`safe_next_url`] and [`with_query`] build the redirect targets used by the CAS flow
//!

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    serde::Deserialize,
    std::{env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    url::form_urlencoded,
    uuid::{ContextV7, Timestamp, Uuid},
    zeroize::{Zeroize, ZeroizeOnDrop},
};

/// Matches `{{ VAR_NAME }}` with optional whitespace around an upper-case name.
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

/// A wrapper for secrets (session secret, LDAP bind password) that prints as
/// `Sensitive(****)` and zeroes its memory when dropped.
///
/// ```
/// use sso_web::Sensitive;
///
/// let secret = Sensitive::from("correct horse battery staple");
/// assert_eq!(format!("{secret:?}"), "Sensitive(****)");
/// assert_eq!(secret.0, "correct horse battery staple");
/// ```
#[derive(Clone, Deserialize, Default, Zeroize, ZeroizeOnDrop)]
pub struct Sensitive<T: Default + Zeroize>(pub T);

impl Sensitive<String> {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Default + Zeroize + PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Default + Zeroize> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensitive(****)")
    }
}

/// Preserves an incoming `x-request-id` header or generates a UUIDv7.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        match req.headers().get("x-request-id") {
            Some(value) => Some(RequestId::new(value.clone())),
            None => {
                let cx = ContextV7::new().with_additional_precision();
                let uuid = Uuid::new_v7(Timestamp::now(cx));
                let value = HeaderValue::from_str(&uuid.to_string()).ok()?;
                Some(RequestId::new(value))
            }
        }
    }
}

/// Replaces `{{ VAR_NAME }}` placeholders with environment variable values.
///
/// Missing variables are replaced with an empty string and logged at WARN.
///
/// ```
/// use sso_web::replace_handlebars_with_env;
///
/// let result = replace_handlebars_with_env("Value: {{ SSO_WEB_SURELY_UNSET }}");
/// assert_eq!(result, "Value: ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

/// Returns `candidate` when it is a local absolute path, otherwise `fallback`.
///
/// Accepted targets start with a single `/` and contain no backslash, so a
/// crafted `nextUrl` cannot send the browser to another host after login.
///
/// ```
/// use sso_web::safe_next_url;
///
/// assert_eq!(safe_next_url(Some("/app/page?x=1"), "/app/"), "/app/page?x=1");
/// assert_eq!(safe_next_url(Some("//evil.example"), "/app/"), "/app/");
/// assert_eq!(safe_next_url(Some("https://evil.example"), "/app/"), "/app/");
/// assert_eq!(safe_next_url(None, "/app/"), "/app/");
/// ```
pub fn safe_next_url(candidate: Option<&str>, fallback: &str) -> String {
    match candidate {
        Some(url) if is_local_path(url) => url.to_string(),
        _ => fallback.to_string(),
    }
}

/// An absolute path on this host: starts with one `/`, no backslash, no
/// control characters.
pub fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.contains('\\')
        && !url.chars().any(char::is_control)
}

/// Appends url-encoded query parameters to `base`, respecting an existing query.
///
/// ```
/// use sso_web::with_query;
///
/// assert_eq!(
///     with_query("https://cas.example/login", &[("service", "https://app/login?nextUrl=/a")]),
///     "https://cas.example/login?service=https%3A%2F%2Fapp%2Flogin%3FnextUrl%3D%2Fa"
/// );
/// assert_eq!(with_query("/p?a=1", &[("b", "2")]), "/p?a=1&b=2");
/// ```
pub fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{encoded}")
}

/// Joins a path prefix and a path, never producing a doubled slash.
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path.is_empty() {
        return format!("{prefix}/");
    }
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// True when `path` is `prefix` itself or lies below it. An empty prefix
/// contains every path.
pub fn path_is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
