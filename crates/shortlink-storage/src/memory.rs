use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shortlink_core::repository::{ReadRepository, Repository, Result};
use shortlink_core::{Link, ShortCode, StorageError};

/// In-memory implementation of [`Repository`] using DashMap.
///
/// Sharded locks let reads and writes to different codes proceed without
/// blocking each other. Suitable for tests and single-node deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    storage: DashMap<ShortCode, Link>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<Link>> {
        Ok(self.storage.get(code).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, link: &Link) -> Result<()> {
        match self.storage.entry(link.hash.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(link.hash.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(link.clone());
                Ok(())
            }
        }
    }

    async fn update_url(&self, code: &ShortCode, original_url: &str) -> Result<bool> {
        let Some(mut entry) = self.storage.get_mut(code) else {
            return Ok(false);
        };
        entry.original_url = original_url.to_string();
        Ok(true)
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.remove(code).is_some())
    }
}
