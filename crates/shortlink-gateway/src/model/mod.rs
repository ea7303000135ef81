mod health;
mod link;

pub use health::HealthResponse;
pub use link::{ErrorResponse, LinkRequest, LinkResponse};
