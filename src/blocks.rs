//!
//! Content blocks: HTML fragments (menus, footer) owned by an external
//! service and embedded in every page.
//!
//! Blocks are fetched per language, all at once, and cached for
//! `block_api.cache_ttl`. A failing block service never fails a page: the
//! request continues with the last blocks fetched for its language, or
//! none, and the service is not asked again for `block_api.retry_after`.
//!

use {
    crate::{
        BlockApiConfig, Config, LocaleConfig, Result,
        context::{context, context_mut},
        locale::resolve_locale,
        pipeline::{Outcome, Stage},
        utils::{path_is_under, with_query},
    },
    axum::extract::Request,
    dashmap::DashMap,
    futures_util::future::{BoxFuture, try_join_all},
    serde::{Deserialize, Serialize},
    std::{
        collections::BTreeMap,
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// Fetched blocks keyed by the names configured in `[block_api.blocks]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blocks(pub BTreeMap<String, String>);

impl Blocks {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub trait BlockCache: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn get<'a>(&'a self, lang: &'a str) -> BoxFuture<'a, Result<Option<Blocks>>>;

    fn put<'a>(&'a self, lang: &'a str, blocks: Blocks) -> BoxFuture<'a, Result<()>>;

    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Drops expired entries. Caches with their own expiry do nothing.
    fn prune(&self) {}
}

pub struct MemoryBlockCache {
    ttl: Duration,
    entries: DashMap<String, (Instant, Blocks)>,
}

impl MemoryBlockCache {
    pub fn new(ttl: Duration) -> Self {
        MemoryBlockCache {
            ttl,
            entries: DashMap::new(),
        }
    }
}

impl BlockCache for MemoryBlockCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get<'a>(&'a self, lang: &'a str) -> BoxFuture<'a, Result<Option<Blocks>>> {
        Box::pin(async move {
            let fresh = self.entries.get(lang).and_then(|entry| {
                let (stored, blocks) = entry.value();
                (stored.elapsed() < self.ttl).then(|| blocks.clone())
            });
            Ok(fresh)
        })
    }

    fn put<'a>(&'a self, lang: &'a str, blocks: Blocks) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.entries
                .insert(lang.to_string(), (Instant::now(), blocks));
            Ok(())
        })
    }

    fn prune(&self) {
        self.entries
            .retain(|_, (stored, _)| stored.elapsed() < self.ttl);
    }
}

#[cfg(feature = "redis")]
pub use self::redis_cache::RedisBlockCache;

#[cfg(feature = "redis")]
mod redis_cache {
    use {
        super::{BlockCache, Blocks},
        crate::Result,
        futures_util::future::BoxFuture,
        redis::{AsyncCommands, aio::ConnectionManager},
        std::time::Duration,
        tokio::sync::OnceCell,
    };

    /// Blocks shared between instances through redis, stored as JSON under
    /// `cortina_block:{lang}` with the TTL as redis expiry.
    pub struct RedisBlockCache {
        client: redis::Client,
        ttl: Duration,
        connection: OnceCell<ConnectionManager>,
    }

    impl RedisBlockCache {
        pub fn new(url: &str, ttl: Duration) -> Result<Self> {
            Ok(RedisBlockCache {
                client: redis::Client::open(url)?,
                ttl,
                connection: OnceCell::new(),
            })
        }

        async fn connection(&self) -> Result<ConnectionManager> {
            let manager = self
                .connection
                .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
                .await?;
            Ok(manager.clone())
        }

        fn key(lang: &str) -> String {
            format!("cortina_block:{lang}")
        }
    }

    impl BlockCache for RedisBlockCache {
        fn name(&self) -> &'static str {
            "redis"
        }

        fn get<'a>(&'a self, lang: &'a str) -> BoxFuture<'a, Result<Option<Blocks>>> {
            Box::pin(async move {
                let mut conn = self.connection().await?;
                let raw: Option<String> = conn.get(Self::key(lang)).await?;
                Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
            })
        }

        fn put<'a>(&'a self, lang: &'a str, blocks: Blocks) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                let mut conn = self.connection().await?;
                let json = serde_json::to_string(&blocks)?;
                let _: () = conn
                    .set_ex(Self::key(lang), json, self.ttl.as_secs().max(1))
                    .await?;
                Ok(())
            })
        }

        fn health(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                let mut conn = self.connection().await?;
                let _: Option<String> = conn.get(Self::key("health")).await?;
                Ok(())
            })
        }
    }
}

/// Per-language state kept across cache expiry.
#[derive(Debug, Clone, Default)]
struct Fallback {
    last_good: Option<Blocks>,
    failed_at: Option<Instant>,
}

/// Fetches the configured blocks from the block service through a cache.
#[derive(Clone)]
pub struct BlockFetcher {
    http: reqwest::Client,
    base_url: String,
    blocks: Arc<BTreeMap<String, String>>,
    cache: Arc<dyn BlockCache>,
    retry_after: Duration,
    fallbacks: Arc<DashMap<String, Fallback>>,
}

impl BlockFetcher {
    pub fn new(config: &BlockApiConfig, cache: Arc<dyn BlockCache>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(BlockFetcher {
            http,
            base_url: config.block_url.clone(),
            blocks: Arc::new(config.blocks.clone()),
            cache,
            retry_after: config.retry_after,
            fallbacks: Arc::new(DashMap::new()),
        })
    }

    /// The cache named by `[cache.cortina_block]`.
    pub fn cache_from_config(config: &Config) -> Result<Arc<dyn BlockCache>> {
        let ttl = config.block_api.cache_ttl;
        match &config.cache.cortina_block.redis {
            #[cfg(feature = "redis")]
            Some(redis) => Ok(Arc::new(RedisBlockCache::new(&redis.url, ttl)?)),
            #[cfg(not(feature = "redis"))]
            Some(_) => {
                tracing::warn!(
                    "cache.cortina_block.redis is configured but the 'redis' feature is not enabled, using the memory cache"
                );
                Ok(Arc::new(MemoryBlockCache::new(ttl)))
            }
            None => Ok(Arc::new(MemoryBlockCache::new(ttl))),
        }
    }

    pub fn cache(&self) -> &Arc<dyn BlockCache> {
        &self.cache
    }

    /// Fetches every block for `lang`, failing if any single fetch fails.
    pub async fn fetch_all(&self, lang: &str) -> Result<Blocks> {
        let fetches = self.blocks.iter().map(|(name, id)| async move {
            let html = self.fetch_one(id, lang).await?;
            Ok::<_, crate::Error>((name.clone(), html))
        });
        let fetched = try_join_all(fetches).await?;
        Ok(Blocks(fetched.into_iter().collect()))
    }

    async fn fetch_one(&self, id: &str, lang: &str) -> Result<String> {
        let url = with_query(&format!("{}{id}", self.base_url), &[("l", lang)]);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(crate::Error::upstream(format!(
                "block {id} answered {status}"
            )));
        }
        Ok(response.text().await?)
    }

    /// Cached blocks for `lang`, fetching on a miss. On failure the last
    /// good blocks for `lang`, or none.
    pub async fn blocks_for(&self, lang: &str) -> Blocks {
        match self.cache.get(lang).await {
            Ok(Some(blocks)) => return blocks,
            Ok(None) => {}
            Err(e) => tracing::warn!(cache = self.cache.name(), error = %e, "block cache read failed"),
        }

        if let Some(stale) = self.backing_off(lang) {
            tracing::trace!(lang = %lang, "block service failed recently, not fetching");
            return stale;
        }

        match self.fetch_all(lang).await {
            Ok(blocks) => {
                if let Err(e) = self.cache.put(lang, blocks.clone()).await {
                    tracing::warn!(cache = self.cache.name(), error = %e, "block cache write failed");
                }
                self.fallbacks.insert(
                    lang.to_string(),
                    Fallback {
                        last_good: Some(blocks.clone()),
                        failed_at: None,
                    },
                );
                blocks
            }
            Err(e) => {
                tracing::warn!(lang = %lang, error = %e, "content blocks unavailable, continuing without them");
                let mut fallback = self.fallbacks.entry(lang.to_string()).or_default();
                fallback.failed_at = Some(Instant::now());
                fallback.last_good.clone().unwrap_or_default()
            }
        }
    }

    /// The blocks to serve while a recent failure is within `retry_after`.
    fn backing_off(&self, lang: &str) -> Option<Blocks> {
        let fallback = self.fallbacks.get(lang)?;
        let failed_at = fallback.failed_at?;
        (failed_at.elapsed() < self.retry_after)
            .then(|| fallback.last_good.clone().unwrap_or_default())
    }
}

/// Attaches [`Blocks`] to requests under the prefix.
pub struct ContentBlocksStage {
    fetcher: BlockFetcher,
    locale: LocaleConfig,
    prefix: String,
}

impl ContentBlocksStage {
    pub fn new(fetcher: BlockFetcher, config: &Config) -> Self {
        ContentBlocksStage {
            fetcher,
            locale: config.locale.clone(),
            prefix: config.prefix().to_string(),
        }
    }
}

impl Stage for ContentBlocksStage {
    fn name(&self) -> &'static str {
        "content-blocks"
    }

    fn attempt(&self, mut request: Request) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            if !path_is_under(request.uri().path(), &self.prefix) {
                return Outcome::Declined(request);
            }

            let cookies = context(&request)
                .map(|ctx| ctx.cookies.clone())
                .unwrap_or_default();
            let locale = resolve_locale(request.uri(), request.headers(), &cookies, &self.locale);
            let blocks = self.fetcher.blocks_for(locale.as_str()).await;
            context_mut(&mut request).blocks = blocks;
            Outcome::Declined(request)
        })
    }
}
