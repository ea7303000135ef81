//! Cache backends for `short code -> original URL` and the layer that keeps
//! them advisory.
//!
//! Backends report their failures honestly through [`CacheError`]. The
//! [`CacheLayer`] is the boundary where those failures stop: lookups degrade
//! to a miss, and writes hand the error back for the caller to log and drop.

pub mod layer;
pub mod moka;
pub mod redis;

pub use self::moka::{MokaCacheConfig, MokaUrlCache};
pub use self::redis::RedisUrlCache;
pub use layer::{CacheLayer, DEFAULT_CACHE_TIMEOUT};
pub use shortlink_core::cache::{Result, UrlCache};
pub use shortlink_core::CacheError;
