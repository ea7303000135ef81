use crate::error::CacheError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, CacheError>;

/// A volatile `short code -> original URL` cache.
///
/// The cache is never authoritative: `Ok(None)` means "unknown", not
/// "deleted". Implementations can use Redis, in-memory caches, or other
/// backends.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get the original URL from cache.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Store the original URL in cache, replacing any previous value.
    async fn set_url(&self, code: &ShortCode, original_url: &str) -> Result<()>;

    /// Remove the entry from cache.
    ///
    /// It is not an error if the key does not exist.
    async fn del(&self, code: &ShortCode) -> Result<()>;
}
