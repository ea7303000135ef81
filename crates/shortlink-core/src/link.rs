use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A shortened link as stored in the durable repository.
///
/// The repository is the owner of record. Caches only ever hold the
/// `hash -> original_url` projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub hash: ShortCode,
    pub original_url: String,
    pub owner_id: String,
    pub created_at: Timestamp,
}

impl Link {
    /// Whether `owner_id` is the identity that created this link.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
