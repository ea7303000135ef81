mod health;
mod link;

pub use health::health_handler;
pub use link::{create_link_handler, delete_link_handler, resolve_handler, update_link_handler};
