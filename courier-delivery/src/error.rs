//! Error types for the dispatch core.
//!
//! Provider errors never leave the dispatcher: they are absorbed by the retry
//! and fallback machinery and only show up as a [`crate::DeliveryStatus`].
//! Configuration errors are reported when a [`crate::Dispatcher`] is built.

use thiserror::Error;

/// Why a single provider send attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider declined or failed to deliver to the recipient.
    #[error("Send rejected by {provider}: {reason}")]
    Rejected { provider: String, reason: String },

    /// The provider could not be reached.
    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The send operation panicked before producing an outcome.
    #[error("Send operation panicked: {0}")]
    Panicked(String),
}

impl ProviderError {
    pub fn rejected(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Invalid dispatcher configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Rate limit max_requests must be positive")]
    ZeroMaxRequests,

    #[error("Rate limit window_ms must be positive")]
    ZeroWindow,

    #[error("Circuit breaker failure_threshold must be positive")]
    ZeroFailureThreshold,

    #[error("Retry max_attempts must be positive")]
    ZeroMaxAttempts,

    #[error("At least one provider must be configured")]
    NoProviders,

    #[error("Provider name {0:?} is used more than once")]
    DuplicateProvider(String),

    #[error("Provider {name} has success_rate {rate}, expected a value in 0.0..=1.0")]
    InvalidSuccessRate { name: String, rate: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let error = ProviderError::rejected("ProviderA", "Send failed");
        assert_eq!(error.to_string(), "Send rejected by ProviderA: Send failed");

        let error = ProviderError::unavailable("ProviderB", "connection refused");
        assert_eq!(
            error.to_string(),
            "Provider ProviderB unavailable: connection refused"
        );

        let error = ProviderError::Panicked("boom".to_string());
        assert_eq!(error.to_string(), "Send operation panicked: boom");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::DuplicateProvider("ProviderA".to_string()).to_string(),
            "Provider name \"ProviderA\" is used more than once"
        );
        assert_eq!(
            ConfigError::InvalidSuccessRate {
                name: "ProviderA".to_string(),
                rate: "1.5".to_string(),
            }
            .to_string(),
            "Provider ProviderA has success_rate 1.5, expected a value in 0.0..=1.0"
        );
    }
}
