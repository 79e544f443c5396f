//! LLM error types and handling

use crate::database::DatabaseError;
use std::time::Duration;
use thiserror::Error;

/// Result type for AI operations
pub type AIResult<T> = Result<T, AIError>;

/// Error types for LLM calls and the steps built on them
#[derive(Error, Debug, Clone)]
pub enum AIError {
    #[error("AI provider is unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("Authentication failed: {provider}")]
    AuthenticationFailure { provider: String },

    #[error("Rate limit exceeded for provider: {provider}, retry after: {retry_after:?}")]
    RateLimitExceeded {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from AI provider: {details}")]
    InvalidResponse { details: String },

    #[error("AI configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("AI provider timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl AIError {
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        AIError::ProviderUnavailable {
            message: message.into(),
        }
    }

    pub fn auth_failure(provider: impl Into<String>) -> Self {
        AIError::AuthenticationFailure {
            provider: provider.into(),
        }
    }

    pub fn rate_limit(provider: impl Into<String>, retry_after: Option<Duration>) -> Self {
        AIError::RateLimitExceeded {
            provider: provider.into(),
            retry_after,
        }
    }

    pub fn invalid_response(details: impl Into<String>) -> Self {
        AIError::InvalidResponse {
            details: details.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        AIError::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        AIError::NetworkError {
            message: message.into(),
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        AIError::Timeout { timeout }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AIError::NetworkError { .. }
                | AIError::Timeout { .. }
                | AIError::ProviderUnavailable { .. }
                | AIError::RateLimitExceeded { .. }
        )
    }

    /// Delay requested by the provider, if any
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            AIError::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Map a non-success HTTP status from a provider to an error
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str, retry_after: Option<Duration>) -> Self {
        match status.as_u16() {
            401 | 403 => AIError::auth_failure(provider),
            429 => AIError::rate_limit(provider, retry_after),
            400 => AIError::invalid_response(format!("{} rejected the request: {}", provider, body)),
            500..=599 => AIError::provider_unavailable(format!("{} server error {}", provider, status)),
            _ => AIError::invalid_response(format!("{} API error {}: {}", provider, status, body)),
        }
    }
}

impl From<reqwest::Error> for AIError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AIError::timeout(Duration::from_secs(30))
        } else if err.is_connect() {
            AIError::provider_unavailable(err.to_string())
        } else {
            AIError::network_error(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AIError {
    fn from(err: serde_json::Error) -> Self {
        AIError::invalid_response(format!("JSON parsing error: {}", err))
    }
}

impl From<DatabaseError> for AIError {
    fn from(err: DatabaseError) -> Self {
        AIError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            AIError::from_status("OpenAI", StatusCode::UNAUTHORIZED, "", None),
            AIError::AuthenticationFailure { .. }
        ));
        assert!(matches!(
            AIError::from_status("OpenAI", StatusCode::TOO_MANY_REQUESTS, "", None),
            AIError::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            AIError::from_status("OpenAI", StatusCode::BAD_GATEWAY, "", None),
            AIError::ProviderUnavailable { .. }
        ));
        assert!(matches!(
            AIError::from_status("OpenAI", StatusCode::BAD_REQUEST, "bad", None),
            AIError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AIError::rate_limit("x", None).is_retryable());
        assert!(AIError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(AIError::provider_unavailable("down").is_retryable());
        assert!(!AIError::auth_failure("x").is_retryable());
        assert!(!AIError::invalid_response("garbage").is_retryable());
    }
}
