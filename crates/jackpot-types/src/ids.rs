//! Stable identifiers for live subscribers.
//!
//! A [`SubscriberId`] is handed out once per registration and never
//! reused within a process. Deregistration looks the subscriber up by
//! this identity, so removing one subscriber can never disturb another
//! regardless of how connects and disconnects interleave.
//!
//! Identifiers are allocated from a monotonically increasing counter,
//! which makes their natural ordering equal to registration order.

use serde::{Deserialize, Serialize};

/// Identity of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl SubscriberId {
    /// Return the inner counter value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<u64> for SubscriberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<SubscriberId> for u64 {
    fn from(id: SubscriberId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_allocation_order() {
        let first = SubscriberId(1);
        let second = SubscriberId(2);
        assert!(first < second);
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(SubscriberId(7).to_string(), "sub-7");
    }
}
