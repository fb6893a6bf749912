//! Delivery providers
//!
//! A provider is an external channel able to deliver to a recipient. The
//! dispatcher only needs a stable name and a `send` that either succeeds or
//! fails; everything else about the transport lives behind the trait.

use async_trait::async_trait;
use courier_common::Recipient;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ProviderError};

/// Capability contract for a delivery channel.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name, used for logging and to look up the provider's breaker
    fn name(&self) -> &str;

    /// Attempt one delivery to `recipient`.
    ///
    /// # Errors
    ///
    /// If the provider did not deliver. There is no partial success.
    async fn send(&self, recipient: &Recipient) -> Result<(), ProviderError>;
}

/// A provider that succeeds at random, standing in for a real transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedProvider {
    pub name: String,

    /// Probability in `0.0..=1.0` that a send succeeds
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

const fn default_success_rate() -> f64 {
    0.5
}

impl SimulatedProvider {
    #[must_use]
    pub fn new(name: impl Into<String>, success_rate: f64) -> Self {
        Self {
            name: name.into(),
            success_rate,
        }
    }

    /// # Errors
    ///
    /// If the success rate is outside `0.0..=1.0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&self.success_rate) {
            Ok(())
        } else {
            Err(ConfigError::InvalidSuccessRate {
                name: self.name.clone(),
                rate: self.success_rate.to_string(),
            })
        }
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, recipient: &Recipient) -> Result<(), ProviderError> {
        let roll: f64 = rand::rng().random();
        if roll < self.success_rate {
            tracing::trace!(provider = %self.name, recipient = %recipient, "Simulated send succeeded");
            Ok(())
        } else {
            Err(ProviderError::rejected(&self.name, "Send failed"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds() {
        let provider = SimulatedProvider::new("ProviderA", 1.0);
        let recipient = Recipient::new("test@example.com");

        for _ in 0..20 {
            assert!(provider.send(&recipient).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_always_fails() {
        let provider = SimulatedProvider::new("ProviderB", 0.0);
        let recipient = Recipient::new("test@example.com");

        for _ in 0..20 {
            assert_eq!(
                provider.send(&recipient).await,
                Err(ProviderError::rejected("ProviderB", "Send failed"))
            );
        }
    }

    #[test]
    fn test_validate_success_rate() {
        assert!(SimulatedProvider::new("ProviderA", 0.5).validate().is_ok());
        assert!(matches!(
            SimulatedProvider::new("ProviderA", 1.5).validate(),
            Err(ConfigError::InvalidSuccessRate { .. })
        ));
        assert!(SimulatedProvider::new("ProviderA", f64::NAN).validate().is_err());
    }

    #[test]
    fn test_deserialize_with_default_rate() {
        let provider: SimulatedProvider = ron::from_str(r#"(name: "ProviderA")"#).unwrap();
        assert_eq!(provider, SimulatedProvider::new("ProviderA", 0.5));
    }
}
