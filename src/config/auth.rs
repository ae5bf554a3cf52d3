use {
    crate::{Error, Result, Sensitive},
    serde::Deserialize,
    std::time::Duration,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Group whose members get `is_admin`. Matched against plain group names
    /// and against the first RDN of DN-style groups (`CN=<group>,OU=...`).
    #[serde(default)]
    pub admin_group: Option<String>,
}

///
/// CAS server settings.
///
/// ```toml
/// [cas]
/// server_url = "https://login.example.com"
/// validate_path = "/p3/serviceValidate"
/// pgt_callback = true
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct CasConfig {
    /// Base URL of the CAS server, e.g. `https://login.example.com`.
    #[serde(default)]
    pub server_url: String,

    #[serde(default = "CasConfig::default_validate_path")]
    pub validate_path: String,

    /// Register `{prefix}/pgtCallback` and ask CAS for proxy-granting tickets.
    #[serde(default)]
    pub pgt_callback: bool,

    /// Application path CAS returns the browser to after logout.
    #[serde(default = "CasConfig::default_logout_landing")]
    pub logout_landing: String,

    #[serde(default = "CasConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl CasConfig {
    fn default_validate_path() -> String {
        "/p3/serviceValidate".into()
    }

    fn default_logout_landing() -> String {
        "/".into()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    /// The server URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::config(
                "cas.server_url is required when authentication is enabled. Set [cas] server_url = \"https://login.example.com\" in config.",
            ));
        }
        url::Url::parse(&self.server_url)
            .map_err(|e| Error::config(format!("cas.server_url is not a valid URL: {e}")))?;
        if !self.validate_path.starts_with('/') {
            return Err(Error::config("cas.validate_path must start with '/'"));
        }
        if !self.logout_landing.starts_with('/') {
            return Err(Error::config("cas.logout_landing must start with '/'"));
        }
        Ok(())
    }
}

impl Default for CasConfig {
    fn default() -> Self {
        CasConfig {
            server_url: String::new(),
            validate_path: Self::default_validate_path(),
            pgt_callback: false,
            logout_landing: Self::default_logout_landing(),
            timeout: Self::default_timeout(),
        }
    }
}

///
/// Directory used to enrich CAS principals with name, email and groups.
/// Only consulted when the `ldap` feature is enabled.
///
/// ```toml
/// [ldap]
/// url = "ldaps://ldap.example.com"
/// base = "ou=people,dc=example,dc=com"
/// bind_dn = "cn=sso-web,dc=example,dc=com"
/// password = "{{ LDAP_PASSWORD }}"
/// user_filter = "(uid={username})"
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct LdapConfig {
    pub url: String,
    pub base: String,
    #[serde(default)]
    pub bind_dn: Option<String>,
    #[serde(default)]
    pub password: Sensitive<String>,

    /// Search filter with a `{username}` placeholder, escaped before use.
    #[serde(default = "LdapConfig::default_user_filter")]
    pub user_filter: String,

    #[serde(default = "LdapConfig::default_attributes")]
    pub attributes: Vec<String>,

    #[serde(default = "LdapConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl LdapConfig {
    fn default_user_filter() -> String {
        "(uid={username})".into()
    }

    fn default_attributes() -> Vec<String> {
        ["displayName", "mail", "memberOf"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ldap://") || self.url.starts_with("ldaps://")) {
            return Err(Error::config(
                "ldap.url must start with ldap:// or ldaps://",
            ));
        }
        if self.base.trim().is_empty() {
            return Err(Error::config("ldap.base is required"));
        }
        if !self.user_filter.contains("{username}") {
            return Err(Error::config(
                "ldap.user_filter must contain the {username} placeholder",
            ));
        }
        Ok(())
    }
}
