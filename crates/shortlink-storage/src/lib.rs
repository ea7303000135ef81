//! Durable link repositories.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use shortlink_core::repository::{ReadRepository, Repository, Result};
pub use shortlink_core::StorageError;
