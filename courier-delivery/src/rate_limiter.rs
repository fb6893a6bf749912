//! Per-recipient rate limiting using a fixed-window counter
//!
//! Each recipient gets a counter and the instant its current window opened.
//! Requests inside the window are counted until `max_requests` is reached;
//! anything beyond that is rejected. The first admission check after the
//! window has elapsed starts a fresh window. There is no background sweeper.
//!
//! # Example
//!
//! ```text
//! Limit: 5 requests per 60 seconds
//!
//! t=0s..10s:  5 requests    → admitted (count 1..=5)
//! t=20s:      6th request   → rejected
//! t=61s:      next request  → window reset, admitted
//! ```
//!
//! Bursts straddling a window boundary are accepted: up to `max_requests` at
//! the end of one window and again at the start of the next.

use std::{sync::Arc, time::Duration};

use courier_common::Recipient;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::error::ConfigError;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per recipient within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Length of a window (milliseconds)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl RateLimitConfig {
    /// # Errors
    ///
    /// If either limit is zero
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if self.window_ms == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }

    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

const fn default_max_requests() -> u32 {
    5
}

const fn default_window_ms() -> u64 {
    60_000 // one minute
}

/// Counter for a single recipient
#[derive(Debug)]
struct RateWindow {
    request_count: u32,
    started_at: Instant,
}

impl RateWindow {
    const fn new(now: Instant) -> Self {
        Self {
            request_count: 0,
            started_at: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.started_at) > window
    }
}

/// Per-recipient rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<Recipient, Arc<parking_lot::Mutex<RateWindow>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn get_window(&self, recipient: &Recipient) -> Arc<parking_lot::Mutex<RateWindow>> {
        self.windows
            .entry(recipient.clone())
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(RateWindow::new(Instant::now()))))
            .clone()
    }

    /// Decide whether a request for `recipient` may proceed.
    ///
    /// Returns `true` if admitted, `false` if the recipient has used up its
    /// window. The check and the counter update happen under the recipient's
    /// lock, so concurrent callers can never admit more than `max_requests`.
    pub fn admit(&self, recipient: &Recipient) -> bool {
        let window = self.get_window(recipient);
        let mut window = window.lock();
        let now = Instant::now();

        if window.is_expired(now, self.config.window()) {
            *window = RateWindow::new(now);
            return true;
        }

        if window.request_count >= self.config.max_requests {
            let retry_in = self
                .config
                .window()
                .saturating_sub(now.duration_since(window.started_at));
            drop(window);
            debug!(
                recipient = %recipient,
                retry_in_ms = u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX),
                "Rate limit exceeded"
            );
            return false;
        }

        window.request_count += 1;
        true
    }

    /// Current window for a recipient, `None` if it was never checked
    pub fn stats(&self, recipient: &Recipient) -> Option<RateLimitStats> {
        self.windows.get(recipient).map(|window| {
            let window = window.lock();
            RateLimitStats {
                request_count: window.request_count,
                window_remaining: self
                    .config
                    .window()
                    .saturating_sub(Instant::now().duration_since(window.started_at)),
            }
        })
    }
}

/// Snapshot of a recipient's rate window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Requests counted in the current window
    pub request_count: u32,
    /// Time until the window may be reset
    pub window_remaining: Duration,
}
