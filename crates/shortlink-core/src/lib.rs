//! Core types and traits for the shortlink service.
//!
//! This crate holds the domain model shared by the allocator, the cache and
//! storage backends, and the link service: the [`Link`] record, the base-62
//! [`ShortCode`], the error taxonomy, and the collaborator traits each backend
//! implements.

pub mod base62;
pub mod cache;
pub mod coordination;
pub mod error;
pub mod link;
pub mod repository;
pub mod shortcode;
pub mod visit;

pub use self::base62::{Base62, ShortCodeEncoder};
pub use cache::UrlCache;
pub use coordination::{CoordinationStore, Version, Versioned};
pub use error::{CacheError, CoordinationError, CoreError, StorageError};
pub use link::Link;
pub use repository::{ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use visit::{ClientAgent, LinkVisit, VisitSink};
