use crate::error::StorageError;
use crate::link::Link;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A read-only view of the durable link store.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the link for a given short code.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<Link>>;
}

/// The durable link store, keyed by short code.
#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new link. Returns `Err(Conflict)` if the code already exists.
    async fn insert(&self, link: &Link) -> Result<()>;

    /// Replaces the original URL of an existing link.
    /// Returns `true` if the link existed and was updated.
    async fn update_url(&self, code: &ShortCode, original_url: &str) -> Result<bool>;

    /// Deletes the link for a given short code.
    /// Returns `true` if the link existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;
}
