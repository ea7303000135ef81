use std::sync::Arc;

use axum::http::HeaderName;
use shortlink_core::{ShortCode, VisitSink};
use shortlink_service::LinkManager;

pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    links: Arc<dyn LinkManager>,
    visits: Arc<dyn VisitSink>,
    base_url: String,
    identity_header: HeaderName,
}

impl AppState {
    pub fn new(
        links: Arc<dyn LinkManager>,
        visits: Arc<dyn VisitSink>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            links,
            visits,
            base_url: public_base_url.into(),
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
        }
    }

    /// Reads the caller identity from `header` instead of `x-user-id`.
    pub fn with_identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }

    pub fn links(&self) -> &dyn LinkManager {
        self.links.as_ref()
    }

    pub fn visits(&self) -> &dyn VisitSink {
        self.visits.as_ref()
    }

    pub fn identity_header(&self) -> &HeaderName {
        &self.identity_header
    }

    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
