//!
//! Request parsing: cookies and JSON or url-encoded bodies.
//!
//! Bodies are read at most up to `http.max_payload_size_bytes`; anything
//! larger ends the request with 413. Other content types are left unread
//! for the handler.
//!

use {
    crate::{
        Error,
        context::{ParsedBody, context_mut},
        pipeline::{Outcome, Stage},
    },
    axum::{
        body::{Body, Bytes},
        extract::Request,
    },
    futures_util::future::BoxFuture,
    http::{HeaderMap, header},
    http_body_util::{BodyExt, LengthLimitError, Limited},
    std::collections::BTreeMap,
    tower_sessions::cookie::Cookie,
    url::form_urlencoded,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/json" => Some(BodyKind::Json),
        m if m.starts_with("application/") && m.ends_with("+json") => Some(BodyKind::Json),
        "application/x-www-form-urlencoded" => Some(BodyKind::Form),
        _ => None,
    }
}

/// All cookies of the request. The first occurrence of a name wins.
pub fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(value).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }
    cookies
}

fn decode(kind: BodyKind, bytes: &[u8]) -> Result<Option<ParsedBody>, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match kind {
        BodyKind::Json => serde_json::from_slice(bytes)
            .map(|value| Some(ParsedBody::Json(value)))
            .map_err(|e| Error::invalid_input(format!("malformed JSON body: {e}"))),
        BodyKind::Form => Ok(Some(ParsedBody::Form(
            form_urlencoded::parse(bytes).into_owned().collect(),
        ))),
    }
}

pub struct RequestParsing {
    limit: usize,
}

impl RequestParsing {
    pub fn new(limit: usize) -> Self {
        RequestParsing { limit }
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, Error> {
        match Limited::new(body, self.limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.is::<LengthLimitError>() => Err(self.too_large()),
            Err(e) => Err(Error::invalid_input(format!("failed to read request body: {e}"))),
        }
    }

    fn too_large(&self) -> Error {
        Error::payload_too_large(format!("request body exceeds {} bytes", self.limit))
    }
}

impl Stage for RequestParsing {
    fn name(&self) -> &'static str {
        "request-parsing"
    }

    fn attempt(&self, request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let cookies = parse_cookies(&parts.headers);

            let Some(kind) = body_kind(&parts.headers) else {
                let mut request = Request::from_parts(parts, body);
                context_mut(&mut request).cookies = cookies;
                return Outcome::Declined(request);
            };

            let declared = parts
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if declared.is_some_and(|len| len > self.limit) {
                return Outcome::Failed(self.too_large());
            }

            let bytes = match self.read_body(body).await {
                Ok(bytes) => bytes,
                Err(e) => return Outcome::Failed(e),
            };
            let parsed = match decode(kind, &bytes) {
                Ok(parsed) => parsed,
                Err(e) => return Outcome::Failed(e),
            };

            parts.headers.remove(header::CONTENT_LENGTH);
            let mut request = Request::from_parts(parts, Body::from(bytes));
            let ctx = context_mut(&mut request);
            ctx.cookies = cookies;
            ctx.body = parsed;
            Outcome::Declined(request)
        })
    }
}
