use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Outcome of the most recent dispatch to a recipient.
///
/// `Sent` is terminal: once a recipient reaches it, further dispatches are
/// no-ops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Never dispatched
    #[default]
    Unset,
    /// A dispatch is walking the provider chain
    Pending,
    Sent,
    /// Rejected by the rate limiter, no provider was tried
    RateLimited,
    /// Every provider was unavailable or exhausted its retries
    Failed,
}

impl DeliveryStatus {
    /// Checks if the status is final for the recipient
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::RateLimited => "rate-limited",
            Self::Failed => "failed",
        };
        fmt.write_str(name)
    }
}

#[cfg(test)]
mod test {
    use super::DeliveryStatus;

    #[test]
    fn status() {
        assert_eq!(DeliveryStatus::default(), DeliveryStatus::Unset);

        assert!(DeliveryStatus::Sent.is_terminal());
        assert!(!DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::RateLimited.is_terminal());

        assert_eq!(DeliveryStatus::RateLimited.to_string(), "rate-limited");
        assert_eq!(DeliveryStatus::Sent.to_string(), "sent");
    }
}
