use shortlink_core::{CoreError, StorageError};
use shortlink_counter::AllocationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkError>;

/// Failures a caller of [`LinkManager`](crate::LinkManager) has to handle.
///
/// Cache failures never show up here.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("identifier allocation failed: {0}")]
    AllocationFailed(#[from] AllocationError),
    #[error("link store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
    #[error("link not found: {0}")]
    NotFound(String),
    #[error("caller does not own link: {0}")]
    Forbidden(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl LinkError {
    /// Whether repeating the whole request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<CoreError> for LinkError {
    fn from(value: CoreError) -> Self {
        match value {
            // A code that can never have been issued has no link behind it.
            CoreError::InvalidShortCode(code) => Self::NotFound(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_store_errors_are_retryable() {
        assert!(LinkError::from(StorageError::Timeout("slow".into())).is_retryable());
        assert!(LinkError::from(StorageError::Unavailable("down".into())).is_retryable());
        assert!(!LinkError::from(StorageError::Query("bad sql".into())).is_retryable());
        assert!(!LinkError::from(AllocationError::RetriesExhausted { attempts: 5 }).is_retryable());
        assert!(!LinkError::NotFound("Q0u".into()).is_retryable());
        assert!(!LinkError::Forbidden("Q0u".into()).is_retryable());
    }

    #[test]
    fn malformed_code_is_not_found() {
        let err = LinkError::from(CoreError::InvalidShortCode("a/b".into()));
        assert!(matches!(err, LinkError::NotFound(_)));
    }
}
