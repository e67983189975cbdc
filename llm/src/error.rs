//! Error types for generator calls.

use std::time::Duration;

/// Errors surfaced by a [`crate::Generator`].
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// API returned a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body returned by the API
        message: String,
    },

    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client misconfiguration (missing key, bad header)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rate limited by the provider
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait before retrying, if the provider sent one
        retry_after: Option<Duration>,
    },

    /// Request timed out
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// How long the request ran before timing out
        duration: Duration,
    },
}

impl LlmError {
    /// Whether a retry with backoff is worthwhile.
    ///
    /// Rate limits, overload responses (5xx), timeouts, and network errors
    /// are transient. Auth, parse, and 4xx failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::Timeout { .. } => true,
            LlmError::Network(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for generator operations
pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_is_retryable_but_bad_request_is_not() {
        let overloaded = LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        };
        assert!(overloaded.is_retryable());

        let bad_request = LlmError::Api {
            status: 400,
            message: "invalid model".to_string(),
        };
        assert!(!bad_request.is_retryable());

        assert!(LlmError::RateLimited { retry_after: None }.is_retryable());
        assert!(!LlmError::Parse("truncated".to_string()).is_retryable());
    }
}
