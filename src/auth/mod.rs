//!
//! CAS single sign-on.
//!
//! [`Authentication`] owns the CAS client, the optional directory and the
//! ticket bookkeeping. It hands out the route gates
//! ([`Authentication::server_login`], [`Authentication::server_gateway_login`])
//! and the pipeline stage that loads the [`Principal`] from the session.
//!
//! Session keys written here:
//! - `principal`: the serialized [`Principal`]
//! - `gateway_attempted`: set once a gateway round trip found no CAS session
//!

mod cas;
mod directory;
mod gates;
pub(crate) mod handlers;
mod tickets;

pub use {
    cas::{CasAssertion, CasBackend, CasClient},
    directory::{DirectoryClient, DirectoryEntry, NoDirectory},
    gates::Gate,
    tickets::{PgtStore, TicketRegistry},
};

#[cfg(feature = "ldap")]
pub use directory::LdapDirectory;

use {
    crate::{
        Config, Error, Result,
        context::{context, context_mut},
        pipeline::{Outcome, Stage},
        utils::with_query,
    },
    axum::{
        extract::Request,
        response::{IntoResponse, Response},
    },
    futures_util::future::BoxFuture,
    http::{StatusCode, header},
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, sync::Arc},
    tower_sessions::Session,
};

pub const PRINCIPAL_KEY: &str = "principal";
pub const GATEWAY_KEY: &str = "gateway_attempted";

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub is_admin: bool,
    pub attributes: BTreeMap<String, Vec<String>>,
    pub proxy_granting_ticket: Option<String>,
    /// The service ticket this login was made with. CAS single logout names it.
    pub login_id: String,
}

impl Principal {
    /// Merges a CAS assertion with the directory entry for the same user.
    /// Directory values win over CAS attributes.
    pub fn new(
        assertion: CasAssertion,
        entry: Option<DirectoryEntry>,
        admin_group: Option<&str>,
        login_id: &str,
    ) -> Self {
        let entry = entry.unwrap_or_default();

        let mut groups = assertion
            .attributes
            .get("memberOf")
            .cloned()
            .unwrap_or_default();
        for group in entry.groups {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        let display_name = entry
            .display_name
            .or_else(|| assertion.attribute("displayName").map(str::to_string));
        let email = entry
            .email
            .or_else(|| assertion.attribute("mail").map(str::to_string));

        let mut attributes = assertion.attributes;
        attributes.extend(entry.attributes);

        Principal {
            is_admin: is_admin_member(&groups, admin_group),
            username: assertion.user,
            display_name,
            email,
            groups,
            attributes,
            proxy_granting_ticket: None,
            login_id: login_id.to_string(),
        }
    }
}

/// True when a group is `admin_group` itself, or a DN whose first RDN is
/// `CN=<admin_group>`.
///
/// ```
/// use sso_web::is_admin_member;
///
/// let groups = vec!["CN=app-admins,OU=Groups,DC=example,DC=com".to_string()];
/// assert!(is_admin_member(&groups, Some("app-admins")));
/// assert!(!is_admin_member(&groups, Some("Groups")));
/// assert!(!is_admin_member(&groups, None));
/// ```
pub fn is_admin_member(groups: &[String], admin_group: Option<&str>) -> bool {
    let Some(admin) = admin_group.filter(|g| !g.is_empty()) else {
        return false;
    };
    groups.iter().any(|group| {
        group == admin
            || group
                .split(',')
                .next()
                .and_then(|rdn| rdn.split_once('='))
                .is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("cn") && value.trim() == admin
                })
    })
}

pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

struct Inner {
    cas: Arc<dyn CasBackend>,
    directory: Arc<dyn DirectoryClient>,
    revoked: TicketRegistry,
    pgts: PgtStore,
    admin_group: Option<String>,
    cas_base: String,
    host: String,
    prefix: String,
    logout_landing: String,
    pgt_callback: bool,
}

#[derive(Clone)]
pub struct Authentication {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication")
            .field("cas", &self.inner.cas_base)
            .field("directory", &self.inner.directory.name())
            .finish()
    }
}

impl Authentication {
    pub fn new(
        config: &Config,
        cas: Arc<dyn CasBackend>,
        directory: Arc<dyn DirectoryClient>,
    ) -> Self {
        Authentication {
            inner: Arc::new(Inner {
                cas,
                directory,
                revoked: TicketRegistry::default(),
                pgts: PgtStore::default(),
                admin_group: config.auth.admin_group.clone(),
                cas_base: config.cas.base().to_string(),
                host: config.host().to_string(),
                prefix: config.prefix().to_string(),
                logout_landing: config.cas.logout_landing.clone(),
                pgt_callback: config.cas.pgt_callback,
            }),
        }
    }

    /// Hard gate: anonymous requests are sent to `{prefix}/login`.
    pub fn server_login(&self) -> Gate {
        Gate::login(self.clone())
    }

    /// Soft gate: one silent CAS round trip, then the request continues
    /// signed in or anonymous. Non-GET requests return to `fallback`.
    pub fn server_gateway_login(&self, fallback: &str) -> Gate {
        Gate::gateway(self.clone(), fallback)
    }

    pub fn stage(&self) -> Arc<dyn Stage> {
        Arc::new(AuthenticationStage { auth: self.clone() })
    }

    pub fn cas(&self) -> &Arc<dyn CasBackend> {
        &self.inner.cas
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryClient> {
        &self.inner.directory
    }

    pub fn pgt_callback_enabled(&self) -> bool {
        self.inner.pgt_callback
    }

    pub(crate) fn prefixed(&self, path: &str) -> String {
        crate::utils::join_path(&self.inner.prefix, path)
    }

    pub fn login_path(&self) -> String {
        self.prefixed("/login")
    }

    pub fn gateway_path(&self) -> String {
        self.prefixed("/loginGateway")
    }

    /// The prefix root, where unsafe or missing `nextUrl`s end up.
    pub fn home(&self) -> String {
        self.prefixed("/")
    }

    fn service(&self, path: String, next: Option<&str>) -> String {
        let base = format!("{}{path}", self.inner.host);
        match next {
            Some(next) => with_query(&base, &[("nextUrl", next)]),
            None => base,
        }
    }

    /// The CAS `service` for the login callback.
    pub fn login_service(&self, next: Option<&str>) -> String {
        self.service(self.login_path(), next)
    }

    /// The CAS `service` for the gateway callback. A gate fallback other
    /// than `/` travels along for callbacks without a usable `nextUrl`.
    pub fn gateway_service(&self, next: Option<&str>, fallback: Option<&str>) -> String {
        let service = self.service(self.gateway_path(), next);
        match fallback.filter(|f| *f != "/") {
            Some(fallback) => with_query(&service, &[("fallback", fallback)]),
            None => service,
        }
    }

    /// `{prefix}{fallback}` for a local fallback, the prefix root otherwise.
    pub fn gateway_fallback(&self, fallback: Option<&str>) -> String {
        match fallback.filter(|f| crate::utils::is_local_path(f)) {
            Some(fallback) => self.prefixed(fallback),
            None => self.home(),
        }
    }

    pub fn cas_login_url(&self, service: &str, extra: &[(&str, &str)]) -> String {
        let mut params = vec![("service", service)];
        params.extend_from_slice(extra);
        with_query(&format!("{}/login", self.inner.cas_base), &params)
    }

    pub fn cas_logout_url(&self) -> String {
        let landing = format!("{}{}", self.inner.host, self.prefixed(&self.inner.logout_landing));
        with_query(
            &format!("{}/logout", self.inner.cas_base),
            &[("service", landing.as_str())],
        )
    }

    /// Validates `ticket`, enriches the principal and stores it in a fresh
    /// session id.
    pub async fn complete_login(
        &self,
        session: &Session,
        ticket: &str,
        service: &str,
    ) -> Result<Principal> {
        let assertion = self.inner.cas.validate(ticket, service).await?;
        let entry = self.inner.directory.lookup(&assertion.user).await?;
        let iou = assertion.proxy_granting_ticket.clone();

        let mut principal =
            Principal::new(assertion, entry, self.inner.admin_group.as_deref(), ticket);
        if let Some(iou) = iou {
            principal.proxy_granting_ticket = self.inner.pgts.take(&iou);
            if principal.proxy_granting_ticket.is_none() {
                tracing::debug!(user = %principal.username, "no proxy-granting ticket delivered for IOU");
            }
        }

        session.cycle_id().await?;
        session.insert(PRINCIPAL_KEY, &principal).await?;
        session.remove_value(GATEWAY_KEY).await?;

        tracing::Span::current().record("user", principal.username.as_str());
        tracing::info!(
            user = %principal.username,
            admin = principal.is_admin,
            directory = self.inner.directory.name(),
            "login completed"
        );
        Ok(principal)
    }

    /// A proxy ticket for `target`, issued with the principal's PGT.
    pub async fn request_proxy_ticket(&self, principal: &Principal, target: &str) -> Result<String> {
        let pgt = principal.proxy_granting_ticket.as_deref().ok_or_else(|| {
            Error::authentication(format!(
                "{} has no proxy-granting ticket, is cas.pgt_callback enabled?",
                principal.username
            ))
        })?;
        self.inner.cas.proxy_ticket(pgt, target).await
    }

    /// Revokes the login made with `login_id`, from CAS single logout.
    pub fn revoke(&self, login_id: &str) {
        self.inner.revoked.revoke(login_id);
    }

    pub fn is_revoked(&self, login_id: &str) -> bool {
        self.inner.revoked.is_revoked(login_id)
    }

    pub fn record_pgt(&self, iou: &str, pgt: &str) {
        self.inner.pgts.insert(iou, pgt);
    }

    pub fn prune(&self) {
        self.inner.revoked.prune();
        self.inner.pgts.prune();
    }
}

/// Loads the principal from the session into the request context.
struct AuthenticationStage {
    auth: Authentication,
}

impl Stage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn attempt(&self, mut request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let Some(session) = context(&request).and_then(|ctx| ctx.session.clone()) else {
                return Outcome::Declined(request);
            };

            let principal = match session.get::<Principal>(PRINCIPAL_KEY).await {
                Ok(principal) => principal,
                Err(e) => return Outcome::Failed(e.into()),
            };
            let Some(principal) = principal else {
                return Outcome::Declined(request);
            };

            if self.auth.is_revoked(&principal.login_id) {
                tracing::info!(user = %principal.username, "login revoked by single logout");
                if let Err(e) = session.flush().await {
                    return Outcome::Failed(e.into());
                }
                return Outcome::Declined(request);
            }

            tracing::Span::current().record("user", principal.username.as_str());
            request.extensions_mut().insert(principal.clone());
            context_mut(&mut request).principal = Some(principal);
            Outcome::Declined(request)
        })
    }
}
