//! Error types for the client pool

use std::sync::Arc;
use thiserror::Error;

/// Error type returned by the caller-supplied hooks (dial, validate, close)
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a hook error, so that `PoolError` stays `Clone`
pub type SharedHookError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("connection pool closed")]
    Closed,

    #[error("connection pool exhausted")]
    Exhausted,

    #[error("failed to dial new client")]
    Dial(#[source] SharedHookError),

    #[error("failed to close client")]
    Close(#[source] SharedHookError),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn dial(err: HookError) -> Self {
        PoolError::Dial(Arc::from(err))
    }

    pub(crate) fn close(err: HookError) -> Self {
        PoolError::Close(Arc::from(err))
    }

    /// Whether the caller may reasonably retry the operation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PoolError::Exhausted | PoolError::Dial(_) | PoolError::Timeout(_)
        )
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_dial_error_keeps_source() {
        let err = PoolError::dial("connection refused".into());
        assert_eq!(err.to_string(), "failed to dial new client");
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_closed_is_not_retryable() {
        assert!(!PoolError::Closed.is_retryable());
        assert_eq!(PoolError::Closed.to_string(), "connection pool closed");
    }
}
