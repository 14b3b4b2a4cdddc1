//! Public error type returned by [`Aikit`](crate::Aikit) and the dispatcher

use crate::config::{ConfigError, ValidationError};
use crate::providers::adapter::ProviderKind;
use crate::providers::error::ProviderError;
use crate::storage::StorageError;
use serde::Serialize;
use thiserror::Error;

pub type AikitResult<T> = Result<T, AikitError>;

/// One failed attempt, kept for diagnostics when the chain is exhausted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub provider: ProviderKind,
    /// 1-based position of the attempt within the call
    pub attempt: u32,
    pub error_kind: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AikitError {
    /// Invalid configuration, detected at construction or reconfiguration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A fatal per-call error that bypassed the retry loop
    #[error("{0}")]
    Request(ProviderError),

    /// Every attempt failed; `last` is the final observed error
    #[error("All attempts failed. Last error: {last}")]
    Exhausted {
        attempts: u32,
        last: ProviderError,
        failures: Vec<AttemptFailure>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AikitError {
    /// The provider error behind this failure, if any
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            AikitError::Request(err) => Some(err),
            AikitError::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, AikitError::Exhausted { .. })
    }
}

impl From<ValidationError> for AikitError {
    fn from(err: ValidationError) -> Self {
        AikitError::Config(ConfigError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_uses_last_error() {
        let err = AikitError::Exhausted {
            attempts: 3,
            last: ProviderError::Timeout(500),
            failures: vec![],
        };
        assert_eq!(
            err.to_string(),
            "All attempts failed. Last error: Request timed out after 500 ms"
        );
        assert!(err.is_exhausted());
        assert_eq!(err.provider_error(), Some(&ProviderError::Timeout(500)));
    }

    #[test]
    fn test_request_error_is_transparent() {
        let err = AikitError::Request(ProviderError::InvalidRequest("Message cannot be empty".into()));
        assert_eq!(err.to_string(), "Invalid request: Message cannot be empty");
    }
}
