use crate::error::CoordinationError;
use async_trait::async_trait;
use std::fmt::Display;

pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Opaque version token attached to every read of a coordination node.
///
/// A node's version changes on every successful write, so a conditional
/// write keyed on a version observed earlier fails once anyone else has
/// written in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The version a node carries after one more successful write.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The payload of a coordination node together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: Version,
}

/// A strongly consistent, versioned key-value store shared by every service
/// instance (ZooKeeper, etcd, a Redis primary, ...).
///
/// Implementations must make [`write_conditional`](Self::write_conditional)
/// atomic with respect to every other writer of the same key.
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Reads a node and the version it was observed at.
    ///
    /// Returns `Err(NotFound)` if the node does not exist.
    async fn read_versioned(&self, key: &str) -> Result<Versioned>;

    /// Replaces the node's payload only if its version is still `expected`.
    ///
    /// Returns `Err(VersionConflict)` when another writer got there first.
    async fn write_conditional(&self, key: &str, value: &[u8], expected: Version) -> Result<()>;

    /// Creates the node with `initial` unless it already exists.
    ///
    /// Returns `true` if this call created the node.
    async fn create_if_absent(&self, key: &str, initial: &[u8]) -> Result<bool>;
}
