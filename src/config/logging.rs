use {
    crate::{Error, Result},
    serde::Deserialize,
    tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
};

///
/// Configuration for logging and tracing.
///
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Format for log output.
    /// The default format is `default`, which is "full" human-readable format.
    /// Other options are `json`, `compact`, and `pretty`.
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directive used when `RUST_LOG` is not set, e.g. `"info"` or
    /// `"sso_web=debug,tower_http=info"`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Colourise output (ignored for `json`).
    #[serde(default)]
    pub console: bool,

    /// Write to stdout instead of stderr.
    #[serde(default = "LoggingConfig::default_stdout")]
    pub stdout: bool,

    /// Include source file and line in every event.
    #[serde(default)]
    pub src: bool,

    #[serde(default)]
    pub access_log: AccessLogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessLogConfig {
    #[serde(default = "AccessLogConfig::default_enabled")]
    pub enabled: bool,
}

impl AccessLogConfig {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        AccessLogConfig {
            enabled: Self::default_enabled(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }

    fn default_stdout() -> bool {
        true
    }

    pub(crate) fn make_writer(&self) -> BoxMakeWriter {
        if self.stdout {
            BoxMakeWriter::new(std::io::stdout)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    }

    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            Error::config(format!("logging.level \"{}\" is invalid: {e}", self.level))
        })?;
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            format: LogFormat::default(),
            level: Self::default_level(),
            console: false,
            stdout: Self::default_stdout(),
            src: false,
            access_log: AccessLogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}
