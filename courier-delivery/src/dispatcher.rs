//! Dispatch orchestration
//!
//! Drives one recipient through the resilience stages:
//!
//! 1. **Idempotency**: recipients already `Sent` are left alone
//! 2. **Rate Limiting**: per-recipient admission
//! 3. **Provider Chain**: providers in priority order, each gated by its
//!    circuit breaker and wrapped in the retry controller
//! 4. **Outcome**: `Sent` on the first success, `Failed` once the chain is used up
//!
//! `dispatch` never returns an error. The status table is the only outcome
//! channel; callers poll [`Dispatcher::status`].
//!
//! Dispatches for the same recipient are serialized by a per-recipient lock,
//! so a second concurrent dispatch sees the outcome of the first one. Different
//! recipients never contend on anything but the sharded maps.

use std::{collections::HashSet, sync::Arc};

use courier_common::{Recipient, internal};
use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::{
    DeliveryStatus,
    circuit_breaker::CircuitBreaker,
    config::DispatchConfig,
    error::ConfigError,
    provider::Provider,
    rate_limiter::RateLimiter,
    retry::{RetryController, RetryOutcome},
};

/// A provider and the breaker tracking its health
struct ProviderSlot {
    provider: Arc<dyn Provider>,
    breaker: CircuitBreaker,
}

/// Dispatches recipients through a prioritized provider chain.
pub struct Dispatcher {
    chain: Vec<ProviderSlot>,
    rate_limiter: RateLimiter,
    retry: RetryController,
    statuses: DashMap<Recipient, DeliveryStatus>,
    /// Serializes dispatches per recipient. Entries only live while a
    /// dispatch for the recipient is running or waiting.
    in_flight: DashMap<Recipient, Arc<Mutex<()>>>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("providers", &self.providers().collect::<Vec<_>>())
            .field("rate_limiter", &self.rate_limiter.config())
            .field("retry", self.retry.policy())
            .field("recipients", &self.statuses.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher over `providers`, highest priority first.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, no providers were given, or two
    /// providers share a name.
    pub fn new(
        config: DispatchConfig,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut seen = HashSet::with_capacity(providers.len());
        for provider in &providers {
            if !seen.insert(provider.name().to_string()) {
                return Err(ConfigError::DuplicateProvider(provider.name().to_string()));
            }
        }

        let chain = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                breaker: CircuitBreaker::new(provider.name(), config.circuit_breaker.clone()),
                provider,
            })
            .collect::<Vec<_>>();

        let (shutdown, shutdown_rx) = watch::channel(false);

        internal!(
            level = DEBUG,
            "Dispatcher ready with {} provider(s): {}",
            chain.len(),
            chain
                .iter()
                .map(|slot| slot.provider.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            chain,
            rate_limiter: RateLimiter::new(config.rate_limit),
            retry: RetryController::new(config.retry).with_shutdown(shutdown_rx),
            statuses: DashMap::new(),
            in_flight: DashMap::new(),
            shutdown,
        })
    }

    fn recipient_lock(&self, recipient: &Recipient) -> Arc<Mutex<()>> {
        self.in_flight
            .entry(recipient.clone())
            .or_default()
            .clone()
    }

    /// Drop the recipient's lock entry once no other dispatch holds or waits on it
    fn release_lock(&self, recipient: &Recipient) {
        // One reference in the map, one held by the caller
        self.in_flight
            .remove_if(recipient, |_, lock| Arc::strong_count(lock) <= 2);
    }

    fn set_status(&self, recipient: &Recipient, status: DeliveryStatus) {
        self.statuses.insert(recipient.clone(), status);
    }

    /// Deliver to `recipient`, recording the outcome in the status table.
    ///
    /// Resolves once a final status for this dispatch has been recorded.
    #[tracing::instrument(level = "info", skip_all, fields(recipient = %recipient))]
    pub async fn dispatch(&self, recipient: &Recipient) {
        let lock = self.recipient_lock(recipient);
        let guard = lock.lock().await;

        self.dispatch_locked(recipient).await;

        drop(guard);
        self.release_lock(recipient);
    }

    async fn dispatch_locked(&self, recipient: &Recipient) {
        if self.status(recipient).is_terminal() {
            info!("Already sent, skipping");
            return;
        }

        if !self.rate_limiter.admit(recipient) {
            info!("Rate limited");
            self.set_status(recipient, DeliveryStatus::RateLimited);
            return;
        }

        self.set_status(recipient, DeliveryStatus::Pending);

        for slot in &self.chain {
            let name = slot.provider.name();

            if !slot.breaker.can_attempt() {
                warn!(provider = name, "Circuit breaker open, skipping provider");
                continue;
            }

            let provider = &slot.provider;
            let outcome = self
                .retry
                .execute(name, move || provider.send(recipient))
                .await;

            match outcome {
                RetryOutcome::Succeeded { attempts } => {
                    slot.breaker.record_success();
                    self.set_status(recipient, DeliveryStatus::Sent);
                    info!(provider = name, attempts, "Sent");
                    return;
                }
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    slot.breaker.record_failure();
                    warn!(
                        provider = name,
                        attempts,
                        error = ?last_error,
                        "Provider exhausted, falling back"
                    );
                }
                RetryOutcome::Abandoned {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        provider = name,
                        attempts,
                        error = %last_error,
                        "Dispatch abandoned for shutdown"
                    );
                    self.set_status(recipient, DeliveryStatus::Failed);
                    return;
                }
            }
        }

        warn!("All providers failed");
        self.set_status(recipient, DeliveryStatus::Failed);
    }

    /// Current status for `recipient`; `Unset` if it was never dispatched
    pub fn status(&self, recipient: &Recipient) -> DeliveryStatus {
        self.statuses
            .get(recipient)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Snapshot of every known recipient's status, ordered by recipient
    pub fn statuses(&self) -> Vec<(Recipient, DeliveryStatus)> {
        let mut statuses = self
            .statuses
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect::<Vec<_>>();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    /// Provider names in priority order
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.chain.iter().map(|slot| slot.provider.name())
    }

    /// Breaker for the named provider
    pub fn breaker(&self, provider: &str) -> Option<&CircuitBreaker> {
        self.chain
            .iter()
            .find(|slot| slot.provider.name() == provider)
            .map(|slot| &slot.breaker)
    }

    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Abandon pending retry backoffs. Further dispatches stop at the first
    /// failed attempt instead of retrying or falling back.
    pub fn shutdown(&self) {
        internal!(level = INFO, "Dispatcher shutting down");
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderError;

    struct Named(&'static str);

    #[async_trait]
    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn send(&self, _recipient: &Recipient) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn providers(names: &[&'static str]) -> Vec<Arc<dyn Provider>> {
        names
            .iter()
            .map(|&name| Arc::new(Named(name)) as Arc<dyn Provider>)
            .collect()
    }

    #[test]
    fn test_rejects_empty_chain() {
        let err = Dispatcher::new(DispatchConfig::default(), Vec::new()).unwrap_err();
        assert_eq!(err, ConfigError::NoProviders);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = Dispatcher::new(DispatchConfig::default(), providers(&["A", "B", "A"]))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateProvider("A".to_string()));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = DispatchConfig::default();
        config.rate_limit.max_requests = 0;
        let err = Dispatcher::new(config, providers(&["A"])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroMaxRequests);
    }

    #[test]
    fn test_chain_order_and_breakers() {
        let dispatcher =
            Dispatcher::new(DispatchConfig::default(), providers(&["A", "B"])).unwrap();

        assert_eq!(dispatcher.providers().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(dispatcher.breaker("B").unwrap().provider(), "B");
        assert!(dispatcher.breaker("C").is_none());
    }

    #[test]
    fn test_unknown_recipient_is_unset() {
        let dispatcher = Dispatcher::new(DispatchConfig::default(), providers(&["A"])).unwrap();
        assert_eq!(
            dispatcher.status(&Recipient::new("test@example.com")),
            DeliveryStatus::Unset
        );
        assert!(dispatcher.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_recipient_locks_are_released() {
        let dispatcher = Dispatcher::new(DispatchConfig::default(), providers(&["A"])).unwrap();
        let first = Recipient::new("first@example.com");
        let second = Recipient::new("second@example.com");

        futures_util::future::join_all([
            dispatcher.dispatch(&first),
            dispatcher.dispatch(&first),
            dispatcher.dispatch(&second),
        ])
        .await;

        assert_eq!(dispatcher.status(&first), DeliveryStatus::Sent);
        assert_eq!(dispatcher.status(&second), DeliveryStatus::Sent);
        assert!(dispatcher.in_flight.is_empty());
    }

    #[test]
    fn test_shutdown_flag() {
        let dispatcher = Dispatcher::new(DispatchConfig::default(), providers(&["A"])).unwrap();
        assert!(!dispatcher.is_shutting_down());
        dispatcher.shutdown();
        assert!(dispatcher.is_shutting_down());
    }
}
