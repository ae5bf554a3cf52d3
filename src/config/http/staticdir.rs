use {
    crate::{Error, Result},
    serde::Deserialize,
};

/// One year, the largest `max-age` browsers honour.
const MAX_CACHE_AGE_SECS: u64 = 31_536_000;

/// Configuration for the static asset gate at `{prefix}/static`.
///
/// Files are resolved under `directory`. Pre-compressed `.br` and `.gz`
/// siblings are served when the client accepts them.
///
/// ```toml
/// [static_files]
/// directory = "./dist"
/// cache_max_age = 86400
/// ```
///
/// HTML files are always sent with `Cache-Control: no-cache` so that
/// component templates under `js/components` are never stale.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticFilesConfig {
    #[serde(default = "StaticFilesConfig::default_directory")]
    pub directory: String,

    /// `max-age` in seconds for non-HTML assets. Unset leaves caching to
    /// the file server defaults (validators only).
    #[serde(default)]
    pub cache_max_age: Option<u64>,
}

impl StaticFilesConfig {
    fn default_directory() -> String {
        "dist".into()
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.trim().is_empty() {
            return Err(Error::config(
                "static_files.directory must not be empty",
            ));
        }
        if let Some(age) = self.cache_max_age
            && age > MAX_CACHE_AGE_SECS
        {
            return Err(Error::config(format!(
                "static_files.cache_max_age must be at most {MAX_CACHE_AGE_SECS} seconds, got {age}"
            )));
        }
        Ok(())
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        StaticFilesConfig {
            directory: Self::default_directory(),
            cache_max_age: None,
        }
    }
}
