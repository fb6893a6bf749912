//! Recipient newtype
//!
//! A recipient is an opaque destination identifier (an e-mail address, a phone
//! number, a device token, ...). The dispatcher never looks inside it; it only
//! hashes and compares it, and hands it to providers.

use std::{
    borrow::Borrow,
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// An opaque recipient identifier.
///
/// Cloning is cheap, the identifier is shared behind an `Arc<str>`.
///
/// ```
/// use courier_common::Recipient;
///
/// let recipient = Recipient::new("test@example.com");
/// assert_eq!(recipient.as_str(), "test@example.com");
///
/// let recipient: Recipient = "+15550100".into();
/// assert_eq!(recipient.to_string(), "+15550100");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Recipient(Arc<str>);

impl Recipient {
    #[must_use]
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Arc<str> {
        self.0
    }
}

impl Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Recipient {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Recipient {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for Recipient {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Recipient {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for Recipient {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Arc<str>> for Recipient {
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clones_share_storage() {
        let recipient = Recipient::new("test@example.com");
        let cloned = recipient.clone();

        assert_eq!(recipient, cloned);
        assert!(Arc::ptr_eq(&recipient.into_inner(), &cloned.into_inner()));
    }

    #[test]
    fn lookup_by_str() {
        let mut statuses = HashMap::new();
        statuses.insert(Recipient::new("test@example.com"), 1);

        assert_eq!(statuses.get("test@example.com"), Some(&1));
        assert_eq!(statuses.get("other@example.com"), None);
    }

    #[test]
    fn serializes_transparently() {
        let recipient = Recipient::new("test@example.com");
        let encoded = ron::to_string(&recipient).unwrap();
        assert_eq!(encoded, "\"test@example.com\"");

        let decoded: Recipient = ron::from_str(&encoded).unwrap();
        assert_eq!(decoded, recipient);
    }
}
