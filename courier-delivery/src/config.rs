use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig, error::ConfigError, rate_limiter::RateLimitConfig,
    retry::RetryPolicy,
};

/// Resilience settings for a [`crate::Dispatcher`]
///
/// ```ron
/// (
///     rate_limit: (max_requests: 5, window_ms: 60000),
///     circuit_breaker: (failure_threshold: 3, reset_timeout_ms: 30000),
///     retry: (max_attempts: 3, base_backoff_ms: 1000),
/// )
/// ```
///
/// Every section, and every field within it, may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-recipient admission limits, shared by all providers
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Settings applied to each provider's breaker
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy applied to every provider call
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl DispatchConfig {
    /// # Errors
    ///
    /// If any section has an invalid limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()
    }
}
