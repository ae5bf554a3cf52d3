use {
    crate::{Error, Result},
    serde::Deserialize,
    std::time::Duration,
    tower_sessions::cookie::SameSite,
};

/// Session cookie settings.
///
/// The record itself lives in the session store. Only its signed id travels
/// in the cookie.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_cookie_name")]
    pub cookie_name: String,

    /// Send the cookie over HTTPS only.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub same_site: SameSiteConfig,

    /// The session expires after this long without a request.
    #[serde(
        default = "SessionConfig::default_inactivity_timeout",
        with = "humantime_serde"
    )]
    pub inactivity_timeout: Duration,
}

impl SessionConfig {
    fn default_cookie_name() -> String {
        "sso-web.sid".into()
    }

    fn default_inactivity_timeout() -> Duration {
        Duration::from_secs(60 * 60)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.trim().is_empty() {
            return Err(Error::config("session.cookie_name must not be empty"));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(Error::config("session.inactivity_timeout must be > 0"));
        }
        if self.same_site == SameSiteConfig::None && !self.secure {
            return Err(Error::config(
                "session.same_site = \"none\" requires session.secure = true",
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            cookie_name: Self::default_cookie_name(),
            secure: false,
            same_site: SameSiteConfig::default(),
            inactivity_timeout: Self::default_inactivity_timeout(),
        }
    }
}

/// `SameSite` attribute of the session cookie. Lax keeps the cookie on the
/// top-level redirect back from the CAS server.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteConfig {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSiteConfig> for SameSite {
    fn from(value: SameSiteConfig) -> Self {
        match value {
            SameSiteConfig::Strict => SameSite::Strict,
            SameSiteConfig::Lax => SameSite::Lax,
            SameSiteConfig::None => SameSite::None,
        }
    }
}
