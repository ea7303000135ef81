use shortlink_core::cache::{Result, UrlCache};
use shortlink_core::{CacheError, ShortCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(200);

/// Keeps a [`UrlCache`] advisory.
///
/// The durable store is always mutated before the cache is touched, so this
/// layer never needs to be right, only fast:
///
/// - [`lookup`](Self::lookup) turns every backend error or timeout into a miss.
/// - [`put`](Self::put) and [`invalidate`](Self::invalidate) log failures and
///   return them; callers drop them after the store write has succeeded.
///
/// Every backend call is bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct CacheLayer<C> {
    cache: C,
    timeout: Duration,
}

impl<C: UrlCache> CacheLayer<C> {
    pub fn new(cache: C) -> Self {
        Self::with_timeout(cache, DEFAULT_CACHE_TIMEOUT)
    }

    pub fn with_timeout(cache: C, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the cached URL, or `None` on a miss or any cache failure.
    pub async fn lookup(&self, code: &ShortCode) -> Option<String> {
        match self.bounded("lookup", self.cache.get_url(code)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(code = %code, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Writes `original_url` for `code`, replacing any previous value.
    pub async fn put(&self, code: &ShortCode, original_url: &str) -> Result<()> {
        self.bounded("put", self.cache.set_url(code, original_url))
            .await
            .inspect(|_| debug!(code = %code, "cache populated"))
            .inspect_err(|e| warn!(code = %code, error = %e, "cache put failed"))
    }

    /// Removes `code` from the cache.
    pub async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        self.bounded("invalidate", self.cache.del(code))
            .await
            .inspect(|_| debug!(code = %code, "cache entry invalidated"))
            .inspect_err(|e| warn!(code = %code, error = %e, "cache invalidate failed"))
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout(format!(
                    "cache {operation} exceeded {:?}",
                    self.timeout
                )))
            })
    }
}
