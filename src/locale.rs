//!
//! Language detection.
//!
//! [`resolve_locale`] tries, in order, the `l` query parameter, the
//! `language` cookie, the `Accept-Language` header and finally the
//! configured default. Only languages listed in `[locale] supported` come out.
//! A language picked with `?l=` is remembered in the `language` cookie.
//!

use {
    crate::{
        LocaleConfig,
        context::{context, context_mut},
        pipeline::{Outcome, Stage},
        utils::path_is_under,
    },
    axum::{extract::Request, response::Response},
    futures_util::future::BoxFuture,
    http::{
        HeaderMap, HeaderValue, Uri,
        header::{ACCEPT_LANGUAGE, SET_COOKIE},
    },
    serde::Serialize,
    std::collections::BTreeMap,
    tower_sessions::cookie::{Cookie, SameSite, time::Duration as CookieDuration},
    url::form_urlencoded,
};

pub const LANGUAGE_COOKIE: &str = "language";
pub const LANGUAGE_QUERY: &str = "l";

/// Where the language of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocaleSource {
    Query,
    Cookie,
    AcceptLanguage,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locale {
    pub language: String,
    pub source: LocaleSource,
}

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.language
    }
}

pub fn resolve_locale(
    uri: &Uri,
    headers: &HeaderMap,
    cookies: &BTreeMap<String, String>,
    config: &LocaleConfig,
) -> Locale {
    let found = |language: &str, source| Locale {
        language: language.to_string(),
        source,
    };

    let from_query = uri.query().and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == LANGUAGE_QUERY)
            .and_then(|(_, value)| config.find(&value).map(str::to_string))
    });
    if let Some(language) = from_query {
        return found(&language, LocaleSource::Query);
    }

    if let Some(language) = cookies
        .get(LANGUAGE_COOKIE)
        .and_then(|value| config.find(value))
    {
        return found(language, LocaleSource::Cookie);
    }

    let accepted = headers
        .get_all(ACCEPT_LANGUAGE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_accept_language)
        .collect::<Vec<_>>();
    if let Some(language) = best_match(accepted, config) {
        return found(language, LocaleSource::AcceptLanguage);
    }

    let default = config.find(&config.default).unwrap_or(&config.default);
    found(default, LocaleSource::Default)
}

/// `en-GB;q=0.8` style entries with their weights. Entries with q=0 or an
/// unparsable weight are dropped.
fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let q = match parts.find_map(|p| p.trim().strip_prefix("q=")) {
                Some(q) => q.trim().parse::<f32>().ok()?,
                None => 1.0,
            };
            (q > 0.0).then(|| (tag.to_string(), q))
        })
        .collect()
}

fn best_match(mut accepted: Vec<(String, f32)>, config: &LocaleConfig) -> Option<&str> {
    // stable sort keeps header order among equal weights
    accepted.sort_by(|a, b| b.1.total_cmp(&a.1));
    accepted.iter().find_map(|(tag, _)| {
        config.find(tag).or_else(|| {
            let primary = tag.split('-').next().unwrap_or(tag);
            config.find(primary)
        })
    })
}

/// `language={language}` for a year, scoped to `path`.
pub fn language_cookie(language: &str, path: &str) -> Cookie<'static> {
    Cookie::build((LANGUAGE_COOKIE, language.to_string()))
        .path(if path.is_empty() { "/" } else { path }.to_string())
        .max_age(CookieDuration::days(365))
        .same_site(SameSite::Lax)
        .build()
}

/// Annotates requests under the prefix with their [`Locale`].
pub struct LocaleStage {
    config: LocaleConfig,
    prefix: String,
}

impl LocaleStage {
    pub fn new(config: LocaleConfig, prefix: impl Into<String>) -> Self {
        LocaleStage {
            config,
            prefix: prefix.into(),
        }
    }

    /// The cookie to set when the query picked a language the cookie does
    /// not hold yet.
    fn cookie_update(&self, locale: &Locale, cookies: &BTreeMap<String, String>) -> Option<HeaderValue> {
        if locale.source != LocaleSource::Query {
            return None;
        }
        if cookies.get(LANGUAGE_COOKIE).is_some_and(|c| c == &locale.language) {
            return None;
        }
        HeaderValue::from_str(&language_cookie(&locale.language, &self.prefix).to_string()).ok()
    }
}

impl Stage for LocaleStage {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn attempt(&self, mut request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            if !path_is_under(request.uri().path(), &self.prefix) {
                return Outcome::Declined(request);
            }

            let empty = BTreeMap::new();
            let cookies = context(&request).map_or(&empty, |ctx| &ctx.cookies);
            let locale = resolve_locale(request.uri(), request.headers(), cookies, &self.config);
            let update = self.cookie_update(&locale, cookies);
            tracing::trace!(language = %locale.language, source = ?locale.source, "locale resolved");

            request.extensions_mut().insert(locale.clone());
            context_mut(&mut request).locale = Some(locale);
            match update {
                Some(cookie) => Outcome::DeclinedThen(
                    request,
                    Box::new(move |response: &mut Response| {
                        response.headers_mut().append(SET_COOKIE, cookie);
                    }),
                ),
                None => Outcome::Declined(request),
            }
        })
    }
}
