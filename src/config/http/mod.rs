mod middleware;
mod ssl;
mod staticdir;

pub use middleware::*;
pub use ssl::*;
pub use staticdir::*;

use {
    crate::{Error, Result},
    serde::Deserialize,
    std::time::Duration,
};

///
/// Configuration for the HTTP server
///
/// Covers the listener (address, port, TLS), the request body limit,
/// routing behaviour and which pipeline stages are mounted.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// IP address to bind the HTTP server to
    /// The default `bind_addr` is "127.0.0.1".
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    /// Port to bind the HTTP server to
    /// The default `port` is 3000.
    #[serde(default = "HttpConfig::default_port")]
    pub port: u16,

    /// Serve HTTPS using the PEM files in `[http.ssl]`.
    #[serde(default)]
    pub use_ssl: bool,

    #[serde(default)]
    pub ssl: SslConfig,

    /// When false, request paths outside the static prefix are lower-cased
    /// before routing. The default is true (case-sensitive routing).
    #[serde(default = "HttpConfig::default_case_sensitive_routing")]
    pub case_sensitive_routing: bool,

    /// Maximum body size for JSON and form requests. Larger bodies are
    /// rejected with 413 Payload Too Large. The default is 100KiB.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// Maximum time to wait for graceful shutdown to complete.
    /// After this timeout, the server will force shutdown.
    /// By default `shutdown_timeout` is set to 30 seconds.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,

    /// `include = [...]` or `exclude = [...]` list of pipeline stages.
    /// All stages are mounted when absent.
    #[serde(default)]
    pub middleware: Option<HttpMiddlewareConfig>,
}

impl HttpConfig {
    ///
    /// Returns the full bind address as a string in the format "IP:PORT".
    ///
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.middleware
            .as_ref()
            .is_none_or(|m| m.is_enabled(middleware))
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_case_sensitive_routing() -> bool {
        true
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(100 * 1024)
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::config(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::config(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if self.max_payload_size_bytes.as_u64() == 0 {
            return Err(Error::config("HTTP max_payload_size_bytes must be > 0"));
        }

        if self.use_ssl {
            self.ssl.validate()?;
        }

        if let Some(middleware_config) = &self.middleware {
            middleware_config.validate()?;
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            port: Self::default_port(),
            use_ssl: false,
            ssl: SslConfig::default(),
            case_sensitive_routing: Self::default_case_sensitive_routing(),
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            shutdown_timeout: Self::default_shutdown_timeout(),
            middleware: None,
        }
    }
}

/// The path prefix under which a reverse proxy exposes the application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyPrefixConfig {
    /// Empty, or an absolute path without a trailing slash such as "/app".
    #[serde(default)]
    pub uri: String,
}

impl ProxyPrefixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.uri.is_empty() {
            return Ok(());
        }
        if !self.uri.starts_with('/') || self.uri.ends_with('/') {
            return Err(Error::config(format!(
                "proxy_prefix_path.uri must start with '/' and must not end with '/', got \"{}\"",
                self.uri
            )));
        }
        Ok(())
    }
}
