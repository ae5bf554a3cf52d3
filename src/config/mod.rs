//!
//! Configuration structures for wiring up the application.
//!
//! A configuration can be created in several ways:
//! - From an environment-specific TOML file via `Config::from_rust_env` or `Config::from_toml_file`
//! - From a TOML string via `Config::from_toml` or `str::parse`
//! - Programmatically from `Config::default()` and the builder methods
//!
//! Environment variables can be referenced in the TOML using the `{{ VAR_NAME }}`
//! syntax and are substituted before parsing, so secrets such as the session
//! secret or the LDAP bind password stay out of the files.
//!
//! The configuration is loaded once, validated, wrapped in an `Arc` by
//! [`crate::FluentRouter`] and never mutated afterwards.
//!
mod auth;
mod blocks;
mod http;
mod logging;
mod session;
mod site;

pub use auth::*;
pub use blocks::*;
pub use http::*;
pub use logging::*;
pub use session::*;
pub use site::*;

pub use byte_unit::Byte;

use {
    crate::{Error, Result, Sensitive, utils::replace_handlebars_with_env},
    serde::Deserialize,
    std::{env, fs, str::FromStr, time::Duration},
};

/// Minimum length in bytes of the secret used to sign session cookies.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Public base URL of the application, without the proxy prefix.
    /// Used to build CAS service URLs and canonical links.
    #[serde(default = "Config::default_host_url")]
    pub host_url: String,

    /// Secret used to sign the session cookie. At least 64 bytes.
    #[serde(default)]
    pub session_secret: Sensitive<String>,

    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy_prefix_path: ProxyPrefixConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cas: CasConfig,
    #[serde(default)]
    pub ldap: Option<LdapConfig>,
    #[serde(default)]
    pub block_api: BlockApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Free-form values exposed to the browser at `{prefix}/static/browserConfig`.
    #[serde(default)]
    pub browser: serde_json::Map<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host_url: Self::default_host_url(),
            session_secret: Sensitive::default(),
            http: HttpConfig::default(),
            proxy_prefix_path: ProxyPrefixConfig::default(),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            cas: CasConfig::default(),
            ldap: None,
            block_api: BlockApiConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            static_files: StaticFilesConfig::default(),
            views: ViewsConfig::default(),
            locale: LocaleConfig::default(),
            crawler: CrawlerConfig::default(),
            browser: serde_json::Map::new(),
        }
    }
}

impl Config {
    fn default_host_url() -> String {
        "http://localhost:3000".into()
    }

    ///
    /// Loads the configuration file named by the RUST_ENV environment variable,
    /// `dev` when it is not set.
    ///
    pub fn from_rust_env() -> Result<Config> {
        let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".into());
        Self::from_toml_file(env)
    }

    ///
    /// Loads `config/{env}.toml`, substitutes environment variables and parses it.
    ///
    pub fn from_toml_file(env: impl AsRef<str>) -> Result<Config> {
        let path = format!("config/{}.toml", env.as_ref());
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::config(format!("Unable to read {path}: {e}")))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(toml_str: &str) -> Result<Config> {
        toml_str.parse()
    }

    /// The proxy prefix every application route lives under (may be empty).
    pub fn prefix(&self) -> &str {
        &self.proxy_prefix_path.uri
    }

    /// Joins `path` onto the proxy prefix.
    pub fn prefixed(&self, path: &str) -> String {
        crate::utils::join_path(self.prefix(), path)
    }

    /// URL prefix of the static asset gate, `{prefix}/static`.
    pub fn static_prefix(&self) -> String {
        format!("{}/static", self.prefix())
    }

    /// Host URL without a trailing slash.
    pub fn host(&self) -> &str {
        self.host_url.trim_end_matches('/')
    }

    pub fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.http.is_middleware_enabled(middleware)
    }

    pub fn with_bind_addr<S: AsRef<str>>(mut self, addr: S) -> Self {
        self.http.bind_addr = addr.as_ref().into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.http.port = port;
        self
    }

    pub fn with_host_url(mut self, url: &str) -> Self {
        self.host_url = url.into();
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.proxy_prefix_path.uri = prefix.into();
        self
    }

    pub fn with_session_secret(mut self, secret: &str) -> Self {
        self.session_secret = Sensitive::from(secret);
        self
    }

    pub fn with_cas_server(mut self, url: &str) -> Self {
        self.cas.server_url = url.into();
        self
    }

    pub fn with_block_url(mut self, url: &str) -> Self {
        self.block_api.block_url = url.into();
        self
    }

    pub fn with_static_dir(mut self, dir: &str) -> Self {
        self.static_files.directory = dir.into();
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.http.shutdown_timeout = timeout;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    pub fn with_excluded_middlewares(mut self, middlewares: Vec<HttpMiddleware>) -> Self {
        self.http.middleware = Some(HttpMiddlewareConfig::Exclude(middlewares));
        self
    }

    pub fn with_included_middlewares(mut self, middlewares: Vec<HttpMiddleware>) -> Self {
        self.http.middleware = Some(HttpMiddlewareConfig::Include(middlewares));
        self
    }

    /// Ensures that the configuration is valid.
    ///
    /// Most values have defaults. The checks here cover values that are
    /// required by an enabled pipeline stage and values whose format matters.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.host_url).map_err(|e| {
            Error::config(format!(
                "host_url must be an absolute URL such as \"https://app.example.com\": {e}"
            ))
        })?;

        self.http.validate()?;
        self.proxy_prefix_path.validate()?;
        if !self.http.case_sensitive_routing && self.prefix() != self.prefix().to_lowercase() {
            return Err(Error::config(format!(
                "proxy_prefix_path.uri `{}` must be lowercase when http.case_sensitive_routing is false",
                self.prefix()
            )));
        }

        if self.is_middleware_enabled(HttpMiddleware::Session) {
            self.session.validate()?;
            if self.session_secret.0.len() < MIN_SESSION_SECRET_LEN {
                return Err(Error::config(format!(
                    "session_secret must be at least {MIN_SESSION_SECRET_LEN} bytes. Set session_secret = \"{{{{ SESSION_SECRET }}}}\" in config."
                )));
            }
        }

        if self.is_middleware_enabled(HttpMiddleware::Authentication) {
            self.cas.validate()?;
            if let Some(ldap) = &self.ldap {
                ldap.validate()?;
            }
        }

        if self.is_middleware_enabled(HttpMiddleware::ContentBlocks) {
            self.block_api.validate()?;
        }

        self.logging.validate()?;
        self.static_files.validate()?;
        self.locale.validate()?;
        self.crawler.validate()?;
        Ok(())
    }

    ///
    /// Sets up the tracing subscriber from the logging section.
    ///
    /// `RUST_LOG` takes precedence over `logging.level`. Calling this more
    /// than once is harmless; only the first call installs a subscriber.
    ///
    pub fn setup_tracing(&self) {
        use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));
        let logging = &self.logging;

        let layer = match logging.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_ansi(false)
                .with_file(logging.src)
                .with_line_number(logging.src)
                .with_writer(logging.make_writer())
                .boxed(),
            LogFormat::Default => fmt::layer()
                .with_ansi(logging.console)
                .with_file(logging.src)
                .with_line_number(logging.src)
                .with_writer(logging.make_writer())
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_ansi(logging.console)
                .with_file(logging.src)
                .with_line_number(logging.src)
                .with_writer(logging.make_writer())
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_ansi(logging.console)
                .with_file(logging.src)
                .with_line_number(logging.src)
                .with_writer(logging.make_writer())
                .boxed(),
        };

        let _ = tracing_subscriber::registry()
            .with(layer)
            .with(env_filter)
            .try_init();
    }
}

///
/// Parses a configuration string, substituting `{{ VAR }}` references with
/// environment variables before handing the text to the TOML parser.
///
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let config_file = replace_handlebars_with_env(s);
        let config = toml::from_str::<Config>(&config_file)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const SECRET: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn valid_config() -> Config {
        Config::default()
            .with_session_secret(SECRET)
            .with_cas_server("https://login.example.com")
    }

    #[test]
    fn test_config_from_str_full() {
        unsafe {
            env::set_var("CONFIG_TEST_SESSION_SECRET", SECRET);
        }

        let config: Config = r#"
host_url = "https://app.example.com"
session_secret = "{{ CONFIG_TEST_SESSION_SECRET }}"

[http]
bind_addr = "0.0.0.0"
port = 8443
use_ssl = true
case_sensitive_routing = false
max_payload_size_bytes = "1MiB"

[http.ssl]
cert = "certs/app.pem"
key = "certs/app.key"

[http.middleware]
exclude = ["content-blocks"]

[proxy_prefix_path]
uri = "/app"

[session]
cookie_name = "app.sid"
secure = true
same_site = "strict"
inactivity_timeout = "2h"

[auth]
admin_group = "app-admins"

[cas]
server_url = "https://login.example.com"
pgt_callback = true

[cache.cortina_block.redis]
url = "redis://localhost:6379"

[logging]
format = "json"
level = "debug"
src = true

[logging.access_log]
enabled = false

[locale]
default = "en"
supported = ["en", "sv"]

[browser]
hostUrl = "https://app.example.com"
features = { search = true }
        "#
        .parse()
        .unwrap();

        unsafe {
            env::remove_var("CONFIG_TEST_SESSION_SECRET");
        }

        assert_eq!(config.session_secret.0, SECRET);
        assert_eq!(config.http.full_bind_addr(), "0.0.0.0:8443");
        assert!(config.http.use_ssl);
        assert!(!config.http.case_sensitive_routing);
        assert_eq!(config.http.max_payload_size_bytes.as_u64(), 1024 * 1024);
        assert_eq!(config.http.ssl.cert.as_deref(), Some("certs/app.pem"));
        assert!(!config.is_middleware_enabled(HttpMiddleware::ContentBlocks));
        assert!(config.is_middleware_enabled(HttpMiddleware::Session));
        assert_eq!(config.prefix(), "/app");
        assert_eq!(config.static_prefix(), "/app/static");
        assert_eq!(config.session.cookie_name, "app.sid");
        assert_eq!(config.session.same_site, SameSiteConfig::Strict);
        assert_eq!(config.session.inactivity_timeout, Duration::from_secs(7200));
        assert!(config.cas.pgt_callback);
        assert_eq!(config.cas.validate_path, "/p3/serviceValidate");
        assert_eq!(
            config.cache.cortina_block.redis.as_ref().unwrap().url,
            "redis://localhost:6379"
        );
        assert!(matches!(config.logging.format, LogFormat::Json));
        assert!(!config.logging.access_log.enabled);
        assert_eq!(config.locale.default, "en");
        assert_eq!(config.browser["features"]["search"], true);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_str_invalid_toml() {
        let result = "this is not valid toml".parse::<Config>();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.http.full_bind_addr(), "127.0.0.1:3000");
        assert!(config.http.case_sensitive_routing);
        assert_eq!(config.prefix(), "");
        assert_eq!(config.prefixed("/login"), "/login");
        assert_eq!(config.static_files.directory, "dist");
        assert_eq!(config.views.directory, "views");
        assert_eq!(config.locale.default, "sv");
    }

    #[test]
    fn test_builder_matches_toml() {
        let built = valid_config()
            .with_prefix("/app")
            .with_port(8080)
            .with_host_url("https://app.example.com");
        let parsed: Config = format!(
            r#"
host_url = "https://app.example.com"
session_secret = "{SECRET}"
[http]
port = 8080
[proxy_prefix_path]
uri = "/app"
[cas]
server_url = "https://login.example.com"
"#
        )
        .parse()
        .unwrap();

        assert_eq!(built.http.full_bind_addr(), parsed.http.full_bind_addr());
        assert_eq!(built.prefix(), parsed.prefix());
        assert_eq!(built.host(), parsed.host());
        assert_eq!(built.session_secret, parsed.session_secret);
        assert_eq!(built.cas.server_url, parsed.cas.server_url);
    }

    #[test]
    fn test_validate_short_session_secret() {
        let config = valid_config().with_session_secret("too-short");
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("session_secret"));
    }

    #[test]
    fn test_validate_short_secret_ok_without_session() {
        let config = valid_config()
            .with_session_secret("")
            .with_excluded_middlewares(vec![
                HttpMiddleware::Session,
                HttpMiddleware::Authentication,
            ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_cas_server() {
        let config = valid_config().with_cas_server("");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cas.server_url"));
    }

    #[test]
    fn test_validate_cas_not_required_without_authentication() {
        let config = valid_config()
            .with_cas_server("")
            .with_excluded_middlewares(vec![HttpMiddleware::Authentication]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_host_url() {
        let config = valid_config().with_host_url("not a url");
        assert!(config.validate().unwrap_err().to_string().contains("host_url"));
    }

    #[test]
    fn test_validate_prefix_trailing_slash() {
        let config = valid_config().with_prefix("/app/");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_authentication_requires_session() {
        let config = valid_config().with_excluded_middlewares(vec![HttpMiddleware::Session]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Authentication requires Session"));
    }

    #[test]
    fn test_validate_block_url_format() {
        let mut config = valid_config();
        config.block_api.blocks.insert("footer".into(), "1.1234".into());
        assert!(config.validate().is_ok());
        config = config.with_block_url("cms.example.com/blocks");
        assert!(config.validate().is_err());
        config = config.with_block_url("https://cms.example.com/blocks/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::from_toml_file("does-not-exist").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("config/does-not-exist.toml"));
    }
}
