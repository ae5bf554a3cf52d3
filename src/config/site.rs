use {
    crate::{Error, Result},
    regex::Regex,
    serde::Deserialize,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
    /// Directory holding `layouts/`, `partials/` and the page templates.
    #[serde(default = "ViewsConfig::default_directory")]
    pub directory: String,
}

impl ViewsConfig {
    fn default_directory() -> String {
        "views".into()
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        ViewsConfig {
            directory: Self::default_directory(),
        }
    }
}

///
/// Languages the application can render.
///
/// ```toml
/// [locale]
/// default = "sv"
/// supported = ["sv", "en"]
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "LocaleConfig::default_language")]
    pub default: String,

    #[serde(default = "LocaleConfig::default_supported")]
    pub supported: Vec<String>,
}

impl LocaleConfig {
    fn default_language() -> String {
        "sv".into()
    }

    fn default_supported() -> Vec<String> {
        vec!["sv".into(), "en".into()]
    }

    /// Returns the configured spelling of `tag` if it is supported.
    pub fn find(&self, tag: &str) -> Option<&str> {
        self.supported
            .iter()
            .find(|l| l.eq_ignore_ascii_case(tag))
            .map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.find(&self.default).is_none() {
            return Err(Error::config(format!(
                "locale.default \"{}\" must be one of locale.supported {:?}",
                self.default, self.supported
            )));
        }
        Ok(())
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        LocaleConfig {
            default: Self::default_language(),
            supported: Self::default_supported(),
        }
    }
}

/// Extra user agent patterns (regular expressions, matched
/// case-insensitively) treated as crawlers on top of the built-in list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub user_agents: Vec<String>,
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        for pattern in &self.user_agents {
            Regex::new(pattern).map_err(|e| {
                Error::config(format!("crawler.user_agents entry \"{pattern}\" is invalid: {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_must_be_supported() {
        let locale = LocaleConfig {
            default: "de".into(),
            supported: vec!["sv".into(), "en".into()],
        };
        assert!(locale.validate().is_err());
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let locale = LocaleConfig::default();
        assert_eq!(locale.find("EN"), Some("en"));
        assert_eq!(locale.find("fi"), None);
    }

    #[test]
    fn test_invalid_crawler_pattern() {
        let crawler = CrawlerConfig {
            user_agents: vec!["(unclosed".into()],
        };
        assert!(crawler.validate().is_err());
    }
}
