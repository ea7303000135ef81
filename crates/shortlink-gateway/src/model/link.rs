use serde::{Deserialize, Serialize};
use shortlink_core::Link;

/// Body of `POST /api/shortlink` and `PUT /api/shortlink/{hash}`.
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub original_url: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    #[serde(flatten)]
    pub link: Link,
    pub short_url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
}
