//! Link lifecycle orchestration: allocate, persist, resolve, mutate.

pub mod error;
pub mod manager;
pub mod service;

pub use error::{LinkError, Result};
pub use manager::LinkManager;
pub use service::{LinkService, ServiceSettings};
