//! Provider error types and handling

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur during a single dispatch attempt
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The request cannot be sent (empty text, missing credential)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bad configuration detected while dispatching
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider answered, but without the fields we need
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Network failure or non-2xx status
    #[error("{}", transport_message(*status, message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Timeout occurred
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The response did not satisfy the call's validation rules
    #[error("Validation failed: {}", reasons.join(", "))]
    ValidationFailure { reasons: Vec<String> },

    /// Operation is not offered by this provider
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

fn transport_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, message),
        None => format!("Network error: {}", message),
    }
}

impl ProviderError {
    /// Whether the dispatcher may retry or fall back after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MalformedResponse { .. } => true,
            Self::RateLimit { .. } => true,
            Self::Transport { .. } => true,
            Self::Timeout(_) => true,
            Self::ValidationFailure { .. } => true,
            Self::InvalidRequest(_) => false,
            Self::Configuration(_) => false,
            Self::Unsupported(_) => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    /// Provider-suggested delay before the next attempt
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short machine-readable kind, used in events and failure history
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::RateLimit { .. } => "rate_limit",
            Self::Transport { .. } => "transport",
            Self::Timeout(_) => "timeout",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::Unsupported(_) => "unsupported",
        }
    }

    pub(crate) fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::malformed("unknown", format!("Failed to parse response: {}", err))
    }
}
