use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_link_handler, delete_link_handler, health_handler, resolve_handler,
    update_link_handler,
};
use crate::state::AppState;

pub struct App;

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/{hash}", get(resolve_handler))
            .nest(
                "/api/shortlink",
                Router::new().route("/", post(create_link_handler)).route(
                    "/{hash}",
                    put(update_link_handler).delete(delete_link_handler),
                ),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
