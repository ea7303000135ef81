use async_trait::async_trait;
use moka::future::Cache;
use shortlink_core::cache::{Result, UrlCache};
use shortlink_core::ShortCode;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// An in-process cache using Moka.
///
/// Entries are local to one process, so an update made by another instance is
/// not seen here until the entry expires. Use it for single-node deployments
/// and tests; multi-instance deployments want [`RedisUrlCache`] instead.
///
/// [`RedisUrlCache`]: crate::RedisUrlCache
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    cache: Cache<ShortCode, String>,
}

impl MokaUrlCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();
        Self { cache }
    }

    /// Entries expire `ttl` after insertion.
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn builder() -> MokaCacheConfigBuilder {
        MokaCacheConfig::builder()
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        match self.cache.get(code).await {
            Some(url) => {
                debug!(code = %code, "Cache hit in Moka");
                Ok(Some(url))
            }
            None => {
                trace!(code = %code, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn set_url(&self, code: &ShortCode, original_url: &str) -> Result<()> {
        self.cache
            .insert(code.clone(), original_url.to_string())
            .await;
        trace!(code = %code, "Cached URL in Moka");
        Ok(())
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        self.cache.invalidate(code).await;
        trace!(code = %code, "Removed URL from Moka cache (if present)");
        Ok(())
    }
}

/// Settings for a [`MokaUrlCache`].
#[derive(Debug, TypedBuilder)]
pub struct MokaCacheConfig {
    #[builder(default = DEFAULT_MAX_CAPACITY)]
    max_capacity: u64,
    /// Expire entries this long after insertion.
    #[builder(default)]
    ttl: Option<Duration>,
    /// Expire entries this long after their last read.
    #[builder(default)]
    tti: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<MokaCacheConfig> for MokaUrlCache {
    fn from(config: MokaCacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        MokaUrlCache {
            cache: builder.build(),
        }
    }
}
