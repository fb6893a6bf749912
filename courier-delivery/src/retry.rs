//! Bounded retry with exponential backoff around a single operation.
//!
//! The controller knows nothing about providers or fallback chains: it runs
//! one operation up to `max_attempts` times, sleeping `base * 2^attempt`
//! between failed attempts, and reports whether the operation eventually
//! succeeded.
//!
//! An operation that panics is treated exactly like one that returned an
//! error. Backoff waits are timer based and never block the worker thread.

use std::{any::Any, future::Future, panic::AssertUnwindSafe, time::Duration};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{ConfigError, ProviderError};

/// Retry policy for a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in milliseconds).
    ///
    /// The wait after the failed attempt `n` (0-indexed) is `base * 2^n`.
    ///
    /// Default: 1000
    #[serde(default = "defaults::base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_backoff_ms: defaults::base_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// # Errors
    ///
    /// If `max_attempts` is zero
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        Ok(())
    }

    /// Delay to wait after the 0-indexed `attempt` failed.
    ///
    /// Saturates instead of overflowing for very large attempt numbers.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let millis = 1u64
            .checked_shl(attempt)
            .map_or(u64::MAX, |multiplier| {
                self.base_backoff_ms.saturating_mul(multiplier)
            });
        Duration::from_millis(millis)
    }

    /// Check if the 0-indexed `attempt` is the last one allowed.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_backoff_ms() -> u64 {
        1_000 // 1 second
    }
}

/// Result of running an operation under a [`RetryController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The operation succeeded on attempt number `attempts` (1-based).
    Succeeded { attempts: u32 },
    /// Every allowed attempt failed.
    Exhausted {
        attempts: u32,
        last_error: Option<ProviderError>,
    },
    /// An attempt failed after shutdown was requested; no further attempts
    /// were made.
    Abandoned {
        attempts: u32,
        last_error: ProviderError,
    },
}

impl RetryOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts }
            | Self::Exhausted { attempts, .. }
            | Self::Abandoned { attempts, .. } => *attempts,
        }
    }
}

/// Runs operations with bounded retries and exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RetryController {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            shutdown: None,
        }
    }

    /// Stop retrying once `shutdown` becomes `true`, cutting any pending
    /// backoff wait short.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds or the policy's attempts run out.
    ///
    /// `target` only labels log events.
    #[tracing::instrument(level = "debug", skip(self, operation))]
    pub async fn execute<F, Fut>(&self, target: &str, mut operation: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), ProviderError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.policy.max_attempts {
            let result = AssertUnwindSafe(async { operation().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(&*panic))));

            let error = match result {
                Ok(()) => {
                    debug!(attempt = attempt + 1, "Attempt succeeded");
                    return RetryOutcome::Succeeded {
                        attempts: attempt + 1,
                    };
                }
                Err(error) => error,
            };

            warn!(attempt = attempt + 1, error = %error, "Attempt failed");

            let abandoned = if self.policy.is_final_attempt(attempt) {
                self.is_shutting_down()
            } else {
                let backoff = self.policy.backoff(attempt);
                debug!(
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "Backing off before next attempt"
                );
                !self.wait(backoff).await
            };

            if abandoned {
                warn!(attempt = attempt + 1, "Shutdown requested, abandoning retries");
                return RetryOutcome::Abandoned {
                    attempts: attempt + 1,
                    last_error: error,
                };
            }

            last_error = Some(error);
        }

        RetryOutcome::Exhausted {
            attempts: self.policy.max_attempts,
            last_error,
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| *shutdown.borrow())
    }

    /// Sleep for `backoff`, returning `false` if shutdown cut the wait short.
    async fn wait(&self, backoff: Duration) -> bool {
        let Some(shutdown) = &self.shutdown else {
            tokio::time::sleep(backoff).await;
            return true;
        };

        let mut shutdown = shutdown.clone();
        if *shutdown.borrow_and_update() {
            return false;
        }

        let stopping = async {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow_and_update() {
                    return;
                }
            }
            // Sender gone, nobody can request shutdown any more
            std::future::pending::<()>().await;
        };

        tokio::select! {
            () = tokio::time::sleep(backoff) => true,
            () = stopping => false,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
