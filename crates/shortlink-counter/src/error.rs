use shortlink_core::CoordinationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AllocationError>;

/// Errors returned by identifier allocation.
///
/// Every variant is fatal to the request that triggered it. The allocator
/// never falls back to a scheme that could hand out a duplicate.
#[derive(Debug, Clone, Error)]
pub enum AllocationError {
    #[error("coordination store error: {0}")]
    Coordination(#[from] CoordinationError),
    #[error("gave up acquiring a range after {attempts} conflicting attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("counter node holds an invalid value: {0}")]
    CorruptCounter(String),
    #[error("invalid lease settings: {0}")]
    InvalidSettings(&'static str),
    #[error("range base {base} overflows the identifier space")]
    RangeOverflow { base: u64 },
}
