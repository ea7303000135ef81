//! HTTP surface for the shortlink service.

pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod model;
pub mod state;
pub mod visit;

pub use app::App;
pub use state::AppState;
pub use visit::ChannelVisitSink;
