use crate::error::Result;
use async_trait::async_trait;
use shortlink_core::{Link, ShortCode};

/// The operations the HTTP layer drives.
///
/// `owner_id` is an opaque identity produced by an upstream authenticator.
/// Ownership is a plain equality check against the stored owner.
#[async_trait]
pub trait LinkManager: Send + Sync + 'static {
    /// Allocates a fresh short code for `original_url` and persists the link.
    async fn create(&self, original_url: &str, owner_id: &str) -> Result<Link>;

    /// Returns the original URL behind `code`.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Points an existing link at `new_url`. Only its owner may do this.
    async fn update(&self, code: &ShortCode, new_url: &str, owner_id: &str) -> Result<Link>;

    /// Removes a link. Only its owner may do this.
    async fn delete(&self, code: &ShortCode, owner_id: &str) -> Result<()>;
}
