use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// What a visitor's user agent says about the client.
///
/// Every field is `None` when the user agent is missing or not recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAgent {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    /// Device category such as `pc`, `smartphone` or `crawler`.
    pub device: Option<String>,
}

/// One resolved redirect, handed off for analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkVisit {
    pub hash: ShortCode,
    pub original_url: String,
    pub client_addr: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub agent: ClientAgent,
    pub accept_language: Option<String>,
    pub accessed_at: Timestamp,
}

/// Fire-and-forget consumer of [`LinkVisit`] events.
///
/// `record` must not block and gives no delivery or ordering guarantee back
/// to the caller; a sink that cannot keep up drops events.
pub trait VisitSink: Send + Sync + 'static {
    fn record(&self, visit: LinkVisit);
}
