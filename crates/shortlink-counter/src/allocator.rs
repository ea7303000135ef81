use crate::error::Result;
use async_trait::async_trait;

/// Source of globally unique, non-negative integers.
///
/// Values returned by one instance are increasing; values from different
/// instances are unique but not ordered relative to each other.
#[async_trait]
pub trait IdAllocator: Send + Sync + 'static {
    async fn next_id(&self) -> Result<u64>;
}
