//! Globally unique integer allocation by range leasing.
//!
//! Every service instance owns a [`RangeLeaseAllocator`]. It claims a whole
//! range of `range_size` integers from a shared [`CoordinationStore`] with a
//! single conditional write, then serves the range locally. Instances never
//! talk to each other; the store's compare-and-set is the only point where
//! they are ordered.
//!
//! [`CoordinationStore`]: shortlink_core::CoordinationStore

pub mod allocator;
pub mod error;
pub mod lease;
pub mod memory;
pub mod redis;

pub use allocator::IdAllocator;
pub use error::{AllocationError, Result};
pub use lease::{Lease, LeaseSettings, RangeLeaseAllocator};
pub use memory::InMemoryCoordinationStore;
pub use self::redis::RedisCoordinationStore;
