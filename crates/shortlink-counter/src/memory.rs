use async_trait::async_trait;
use parking_lot::Mutex;
use shortlink_core::coordination::Result;
use shortlink_core::{CoordinationError, CoordinationStore, Version, Versioned};
use std::collections::HashMap;
use std::sync::Arc;

/// In-process [`CoordinationStore`].
///
/// Clones share the same nodes, so several allocators in one process (or one
/// test) can contend on a single counter exactly as separate instances would
/// on a real store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoordinationStore {
    nodes: Arc<Mutex<HashMap<String, Versioned>>>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn read_versioned(&self, key: &str) -> Result<Versioned> {
        self.nodes
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| CoordinationError::NotFound(key.to_string()))
    }

    async fn write_conditional(&self, key: &str, value: &[u8], expected: Version) -> Result<()> {
        let mut nodes = self.nodes.lock();
        let node = nodes
            .get_mut(key)
            .ok_or_else(|| CoordinationError::NotFound(key.to_string()))?;

        if node.version != expected {
            return Err(CoordinationError::VersionConflict { expected });
        }

        node.value = value.to_vec();
        node.version = node.version.next();
        Ok(())
    }

    async fn create_if_absent(&self, key: &str, initial: &[u8]) -> Result<bool> {
        let mut nodes = self.nodes.lock();
        if nodes.contains_key(key) {
            return Ok(false);
        }

        nodes.insert(
            key.to_string(),
            Versioned {
                value: initial.to_vec(),
                version: Version::new(0),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_missing_node() {
        let store = InMemoryCoordinationStore::new();

        let err = store.read_versioned("counter").await.unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_if_absent_only_creates_once() {
        let store = InMemoryCoordinationStore::new();

        assert!(store.create_if_absent("counter", b"0").await.unwrap());
        assert!(!store.create_if_absent("counter", b"9").await.unwrap());

        let node = store.read_versioned("counter").await.unwrap();
        assert_eq!(node.value, b"0");
        assert_eq!(node.version, Version::new(0));
    }

    #[tokio::test]
    async fn conditional_write_bumps_version() {
        let store = InMemoryCoordinationStore::new();
        store.create_if_absent("counter", b"0").await.unwrap();

        store
            .write_conditional("counter", b"1", Version::new(0))
            .await
            .unwrap();

        let node = store.read_versioned("counter").await.unwrap();
        assert_eq!(node.value, b"1");
        assert_eq!(node.version, Version::new(1));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryCoordinationStore::new();
        store.create_if_absent("counter", b"0").await.unwrap();
        let seen = store.read_versioned("counter").await.unwrap();

        store
            .write_conditional("counter", b"1", seen.version)
            .await
            .unwrap();
        let err = store
            .write_conditional("counter", b"1", seen.version)
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinationError::VersionConflict { .. }));
        assert_eq!(store.read_versioned("counter").await.unwrap().value, b"1");
    }

    #[tokio::test]
    async fn conditional_write_on_missing_node() {
        let store = InMemoryCoordinationStore::new();

        let err = store
            .write_conditional("counter", b"1", Version::new(0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn clones_share_nodes() {
        let store = InMemoryCoordinationStore::new();
        let other = store.clone();

        store.create_if_absent("counter", b"5").await.unwrap();
        assert_eq!(other.read_versioned("counter").await.unwrap().value, b"5");
    }
}
