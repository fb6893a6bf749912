//! Per-provider circuit breaker
//!
//! Every provider in the dispatch chain owns one breaker. The breaker tracks
//! provider health independently of recipients: any failed delivery through
//! the provider counts against it, and any success resets it.
//!
//! # State Transitions
//!
//! ```text
//! ┌─────────┐  failure_count >= threshold  ┌──────┐
//! │ Closed  │ ──────────────────────────>  │ Open │
//! └─────────┘                               └──────┘
//!     ^                                        │
//!     │                                        │ reset timeout elapsed
//!     │                                        v
//!     │  next can_attempt()    ┌───────────────┐
//!     └────────────────────────│  Half-Open    │
//!         (count reset to 0)   └───────────────┘
//! ```
//!
//! Half-open is not stored anywhere. It is what an open breaker looks like once
//! the reset timeout has passed since the last failure; the first
//! `can_attempt()` call in that state lets the probe through and zeroes the
//! failure count, which closes the breaker again.
//!
//! # Example
//!
//! ```text
//! Threshold: 3 failures
//! Reset timeout: 30 seconds
//!
//! t=0s..5s:  3 failures → Open
//! t=5s..35s: can_attempt() = false
//! t=35.001s: can_attempt() = true, failure_count = 0 → Closed
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open after the last failure (milliseconds)
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// # Errors
    ///
    /// If the failure threshold is zero
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        Ok(())
    }

    pub const fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_reset_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - attempts allowed
    Closed,
    /// Circuit tripped - attempts rejected until the reset timeout passes
    Open,
    /// Reset timeout passed - the next attempt is a probe
    HalfOpen,
}

#[derive(Debug, Default)]
struct BreakerData {
    failure_count: u32,
    last_failure: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
}

impl BreakerData {
    fn reset_timeout_elapsed(&self, now: Instant, reset_timeout: Duration) -> bool {
        self.last_failure
            .is_none_or(|last_failure| now.duration_since(last_failure) > reset_timeout)
    }
}

/// Circuit breaker guarding a single provider
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Name of the guarded provider, for logging
    provider: String,
    config: CircuitBreakerConfig,
    data: parking_lot::Mutex<BreakerData>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            data: parking_lot::Mutex::new(BreakerData::default()),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Check if an attempt against the provider should be made
    ///
    /// Returns `false` while the circuit is open. Once the reset timeout has
    /// elapsed since the last failure this returns `true` and clears the
    /// failure count.
    pub fn can_attempt(&self) -> bool {
        let mut data = self.data.lock();

        if data.failure_count < self.config.failure_threshold {
            return true;
        }

        if data.reset_timeout_elapsed(Instant::now(), self.config.reset_timeout()) {
            data.failure_count = 0;
            drop(data);
            info!(
                provider = %self.provider,
                "Circuit breaker reset timeout elapsed - allowing probe"
            );
            true
        } else {
            false
        }
    }

    /// Record a successful delivery through the provider
    pub fn record_success(&self) {
        let mut data = self.data.lock();
        data.failure_count = 0;
        data.total_successes += 1;
    }

    /// Record an exhausted delivery through the provider
    pub fn record_failure(&self) {
        let mut data = self.data.lock();
        data.failure_count = data.failure_count.saturating_add(1);
        data.last_failure = Some(Instant::now());
        data.total_failures += 1;

        if data.failure_count == self.config.failure_threshold {
            let failure_count = data.failure_count;
            drop(data);
            warn!(
                provider = %self.provider,
                failure_count,
                reset_timeout_ms = self.config.reset_timeout_ms,
                "Circuit breaker OPENED - skipping provider until reset timeout"
            );
        }
    }

    /// Current state, derived from the failure count and timing
    ///
    /// Unlike [`Self::can_attempt`] this never changes the breaker.
    pub fn state(&self) -> CircuitState {
        let data = self.data.lock();
        Self::derive_state(&data, &self.config)
    }

    fn derive_state(data: &BreakerData, config: &CircuitBreakerConfig) -> CircuitState {
        if data.failure_count < config.failure_threshold {
            CircuitState::Closed
        } else if data.reset_timeout_elapsed(Instant::now(), config.reset_timeout()) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            state: Self::derive_state(&data, &self.config),
            failure_count: data.failure_count,
            total_failures: data.total_failures,
            total_successes: data.total_successes,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Failures since the last success or reset
    pub failure_count: u32,
    /// Failures recorded over the breaker's lifetime
    pub total_failures: u64,
    /// Successes recorded over the breaker's lifetime
    pub total_successes: u64,
}
