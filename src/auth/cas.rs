//!
//! CAS protocol 3 client: service ticket validation and proxy tickets.
//!

use {
    crate::{Config, Error, Result, utils::with_query},
    futures_util::future::BoxFuture,
    serde::Deserialize,
    serde_json::Value,
    std::collections::BTreeMap,
};

/// A successful ticket validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CasAssertion {
    pub user: String,
    pub attributes: BTreeMap<String, Vec<String>>,
    /// The PGT IOU, exchanged for the real ticket through `pgtCallback`.
    pub proxy_granting_ticket: Option<String>,
}

impl CasAssertion {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// The CAS server as seen by the login handlers.
pub trait CasBackend: Send + Sync + 'static {
    /// Validates `ticket` for `service`. A rejected ticket is an
    /// [`ErrorKind::Authentication`](crate::ErrorKind::Authentication) error,
    /// an unreachable server an upstream error.
    fn validate<'a>(&'a self, ticket: &'a str, service: &'a str)
    -> BoxFuture<'a, Result<CasAssertion>>;

    fn proxy_ticket<'a>(&'a self, pgt: &'a str, target: &'a str) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Deserialize)]
struct CasEnvelope {
    #[serde(rename = "serviceResponse")]
    service_response: ServiceResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    authentication_success: Option<AuthenticationSuccess>,
    authentication_failure: Option<CasFailure>,
    proxy_success: Option<ProxySuccess>,
    proxy_failure: Option<CasFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationSuccess {
    user: String,
    proxy_granting_ticket: Option<String>,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxySuccess {
    proxy_ticket: String,
}

#[derive(Debug, Deserialize)]
struct CasFailure {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

impl CasFailure {
    fn message(&self) -> String {
        format!("{}: {}", self.code, self.description.trim())
    }
}

fn attribute_values(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(attribute_values).collect(),
        other => vec![other.to_string()],
    }
}

pub(crate) fn parse_validation(body: &str) -> Result<CasAssertion> {
    let envelope: CasEnvelope = serde_json::from_str(body)
        .map_err(|e| Error::upstream(format!("unreadable CAS validation response: {e}")))?;
    let response = envelope.service_response;

    if let Some(failure) = response.authentication_failure {
        return Err(Error::authentication(failure.message()));
    }
    let success = response
        .authentication_success
        .ok_or_else(|| Error::upstream("CAS validation response has neither success nor failure"))?;

    let attributes = success
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), attribute_values(value)))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    Ok(CasAssertion {
        user: success.user,
        attributes,
        proxy_granting_ticket: success.proxy_granting_ticket,
    })
}

pub(crate) fn parse_proxy(body: &str) -> Result<String> {
    let envelope: CasEnvelope = serde_json::from_str(body)
        .map_err(|e| Error::upstream(format!("unreadable CAS proxy response: {e}")))?;
    let response = envelope.service_response;

    if let Some(failure) = response.proxy_failure {
        return Err(Error::authentication(failure.message()));
    }
    response
        .proxy_success
        .map(|success| success.proxy_ticket)
        .ok_or_else(|| Error::upstream("CAS proxy response has neither success nor failure"))
}

/// [`CasBackend`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct CasClient {
    http: reqwest::Client,
    base: String,
    validate_path: String,
    pgt_url: Option<String>,
}

impl CasClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.cas.timeout)
            .build()?;
        let pgt_url = config
            .cas
            .pgt_callback
            .then(|| format!("{}{}", config.host(), config.prefixed("/pgtCallback")));
        Ok(CasClient {
            http,
            base: config.cas.base().to_string(),
            validate_path: config.cas.validate_path.clone(),
            pgt_url,
        })
    }

    pub fn validate_url(&self, ticket: &str, service: &str) -> String {
        let mut params = vec![("service", service), ("ticket", ticket), ("format", "JSON")];
        if let Some(pgt_url) = &self.pgt_url {
            params.push(("pgtUrl", pgt_url));
        }
        with_query(&format!("{}{}", self.base, self.validate_path), &params)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(format!("CAS server answered {status}")));
        }
        Ok(response.text().await?)
    }
}

impl CasBackend for CasClient {
    fn validate<'a>(
        &'a self,
        ticket: &'a str,
        service: &'a str,
    ) -> BoxFuture<'a, Result<CasAssertion>> {
        Box::pin(async move {
            let body = self.get_text(&self.validate_url(ticket, service)).await?;
            parse_validation(&body)
        })
    }

    fn proxy_ticket<'a>(&'a self, pgt: &'a str, target: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let url = with_query(
                &format!("{}/proxy", self.base),
                &[("pgt", pgt), ("targetService", target), ("format", "JSON")],
            );
            let body = self.get_text(&url).await?;
            parse_proxy(&body)
        })
    }
}
