use {
    crate::{Error, Result},
    serde::Deserialize,
    std::{collections::BTreeMap, time::Duration},
};

///
/// External content block service.
///
/// Each entry in `blocks` maps the name a template uses to the block id
/// fetched from `{block_url}{id}?l={lang}`. Fetching is off while
/// `block_url` is empty. After a failed fetch the service is left alone for
/// `retry_after`.
///
/// ```toml
/// [block_api]
/// block_url = "https://cms.example.com/blocks/"
/// cache_ttl = "10m"
/// retry_after = "30s"
///
/// [block_api.blocks]
/// footer = "1.202278"
/// megaMenu = "1.855134"
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct BlockApiConfig {
    #[serde(default)]
    pub block_url: String,

    #[serde(default)]
    pub blocks: BTreeMap<String, String>,

    #[serde(default = "BlockApiConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(
        default = "BlockApiConfig::default_cache_ttl",
        with = "humantime_serde"
    )]
    pub cache_ttl: Duration,

    #[serde(
        default = "BlockApiConfig::default_retry_after",
        with = "humantime_serde"
    )]
    pub retry_after: Duration,
}

impl BlockApiConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    fn default_cache_ttl() -> Duration {
        Duration::from_secs(10 * 60)
    }

    fn default_retry_after() -> Duration {
        Duration::from_secs(30)
    }

    pub fn is_enabled(&self) -> bool {
        !self.block_url.trim().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        url::Url::parse(&self.block_url)
            .map_err(|e| Error::config(format!("block_api.block_url is not a valid URL: {e}")))?;
        if let Some((name, _)) = self.blocks.iter().find(|(_, id)| id.trim().is_empty()) {
            return Err(Error::config(format!(
                "block_api.blocks.{name} has an empty block id"
            )));
        }
        Ok(())
    }
}

impl Default for BlockApiConfig {
    fn default() -> Self {
        BlockApiConfig {
            block_url: String::new(),
            blocks: BTreeMap::new(),
            timeout: Self::default_timeout(),
            cache_ttl: Self::default_cache_ttl(),
            retry_after: Self::default_retry_after(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub cortina_block: BlockCacheConfig,
}

/// Where fetched blocks are cached. In process memory unless `redis` is set
/// and the `redis` feature is enabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockCacheConfig {
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}
