//! Resilient dispatch of recipients through a chain of delivery providers
//!
//! This crate provides:
//! - A per-recipient fixed-window [`RateLimiter`]
//! - A per-provider [`CircuitBreaker`]
//! - A [`RetryController`] with exponential backoff
//! - The [`Dispatcher`] tying them together with provider fallback and
//!   per-recipient [`DeliveryStatus`] tracking

pub mod circuit_breaker;
mod config;
mod dispatcher;
mod error;
pub mod provider;
pub mod rate_limiter;
pub mod retry;
mod status;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::DispatchConfig;
pub use courier_common::Recipient;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, ProviderError};
pub use provider::{Provider, SimulatedProvider};
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use retry::{RetryController, RetryOutcome, RetryPolicy};
pub use status::DeliveryStatus;
