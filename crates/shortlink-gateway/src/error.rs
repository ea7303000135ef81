use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shortlink_service::LinkError;
use tracing::error;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    Link(LinkError),
    /// The request carried no caller identity.
    Unauthenticated,
}

impl From<LinkError> for AppError {
    fn from(value: LinkError) -> Self {
        Self::Link(value)
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Link(e) => match e {
                LinkError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                LinkError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
                LinkError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
                LinkError::AllocationFailed(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "allocation_failed")
                }
                LinkError::StoreUnavailable(_) if e.is_retryable() => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
                LinkError::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Unauthenticated => "caller identity is required".to_string(),
            Self::Link(e) if status.is_server_error() => {
                error!(error = %e, status = status.as_u16(), "request failed");
                // Backend details stay in the log.
                status
                    .canonical_reason()
                    .unwrap_or("internal error")
                    .to_string()
            }
            Self::Link(e) => e.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                code,
                error: message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortlink_core::{CoordinationError, StorageError};
    use shortlink_counter::AllocationError;

    fn status(e: impl Into<AppError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn link_errors_map_to_statuses() {
        assert_eq!(status(LinkError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(LinkError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(LinkError::InvalidUrl("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(LinkError::AllocationFailed(AllocationError::Coordination(
                CoordinationError::Unavailable("down".into())
            ))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(LinkError::StoreUnavailable(StorageError::Timeout("slow".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(LinkError::StoreUnavailable(StorageError::Query("bad".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(AppError::Unauthenticated), StatusCode::UNAUTHORIZED);
    }
}
