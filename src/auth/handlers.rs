//! Route handlers for the CAS callbacks.

use {
    super::{Authentication, GATEWAY_KEY, found},
    crate::{Error, ErrorKind, RequestContext, Result, utils::safe_next_url},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    http::StatusCode,
    regex::Regex,
    serde::Deserialize,
    std::sync::LazyLock,
    tower_sessions::Session,
};

static SESSION_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:samlp:)?SessionIndex[^>]*>\s*([^<\s]+)\s*</(?:samlp:)?SessionIndex>").unwrap()
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasCallback {
    pub ticket: Option<String>,
    pub next_url: Option<String>,
    /// Set by a gateway gate whose fallback is not `/`.
    pub fallback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgtCallback {
    pub pgt_iou: Option<String>,
    pub pgt_id: Option<String>,
}

fn session(ctx: &RequestContext) -> Result<&Session> {
    ctx.session
        .as_ref()
        .ok_or_else(|| Error::session("no session on request, is the session stage mounted?"))
}

/// `GET {prefix}/login`
pub async fn login(
    State(auth): State<Authentication>,
    Query(callback): Query<CasCallback>,
    ctx: RequestContext,
) -> Result<Response> {
    let next = callback.next_url.as_deref();
    let service = auth.login_service(next);

    let Some(ticket) = callback.ticket else {
        if ctx.is_authenticated() {
            return Ok(found(&safe_next_url(next, &auth.home())));
        }
        return Ok(found(&auth.cas_login_url(&service, &[])));
    };

    match auth.complete_login(session(&ctx)?, &ticket, &service).await {
        Ok(_) => Ok(found(&safe_next_url(next, &auth.home()))),
        Err(e) if e.kind() == ErrorKind::Authentication => {
            tracing::warn!(error = %e, "ticket validation failed, renewing CAS login");
            Ok(found(&auth.cas_login_url(&service, &[("renew", "true")])))
        }
        Err(e) => Err(e),
    }
}

/// `GET {prefix}/loginGateway`
pub async fn login_gateway(
    State(auth): State<Authentication>,
    Query(callback): Query<CasCallback>,
    ctx: RequestContext,
) -> Result<Response> {
    let session = session(&ctx)?;
    let next = callback.next_url.as_deref();
    let fallback = callback.fallback.as_deref();
    let target = safe_next_url(next, &auth.gateway_fallback(fallback));

    if let Some(ticket) = callback.ticket {
        let service = auth.gateway_service(next, fallback);
        match auth.complete_login(session, &ticket, &service).await {
            Ok(_) => return Ok(found(&target)),
            Err(e) => {
                tracing::warn!(error = %e, "gateway login failed, continuing anonymously");
            }
        }
    }

    session.insert(GATEWAY_KEY, true).await?;
    Ok(found(&target))
}

/// `GET {prefix}/logout`
pub async fn logout(State(auth): State<Authentication>, ctx: RequestContext) -> Result<Response> {
    if let Some(session) = &ctx.session {
        session.flush().await?;
    }
    if let Some(principal) = &ctx.principal {
        tracing::info!(user = %principal.username, "logout");
    }
    Ok(found(&auth.cas_logout_url()))
}

/// `POST {prefix}/login` and `POST {prefix}/loginGateway`, the CAS
/// single-logout back channel.
pub async fn single_logout(
    State(auth): State<Authentication>,
    ctx: RequestContext,
) -> Result<Response> {
    let request = ctx
        .body
        .as_ref()
        .and_then(|body| body.field("logoutRequest"))
        .ok_or_else(|| Error::invalid_input("missing logoutRequest"))?;

    let ticket = SESSION_INDEX
        .captures(request)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::invalid_input("logoutRequest has no SessionIndex"))?;

    auth.revoke(ticket);
    tracing::info!(ticket = %ticket, "single logout");
    Ok(StatusCode::OK.into_response())
}

/// `GET {prefix}/pgtCallback`. CAS calls it without parameters first.
pub async fn pgt_callback(
    State(auth): State<Authentication>,
    Query(callback): Query<PgtCallback>,
) -> StatusCode {
    if let (Some(iou), Some(pgt)) = (&callback.pgt_iou, &callback.pgt_id) {
        auth.record_pgt(iou, pgt);
        tracing::debug!("proxy-granting ticket received");
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_index_extraction() {
        let request = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="LR-1" Version="2.0">
            <saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">@NOT_USED@</saml:NameID>
            <samlp:SessionIndex> ST-1-abc </samlp:SessionIndex>
        </samlp:LogoutRequest>"#;
        let caps = SESSION_INDEX.captures(request).unwrap();
        assert_eq!(&caps[1], "ST-1-abc");

        let plain = "<LogoutRequest><SessionIndex>ST-2</SessionIndex></LogoutRequest>";
        assert_eq!(&SESSION_INDEX.captures(plain).unwrap()[1], "ST-2");
    }
}
