//! Per-subscription critical sections.
//!
//! Every read-modify-write of a subscription, and every payment event
//! creation, runs while holding the lock for that subscription's key.
//! Gateway calls are never made while a guard is held.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriptionId};

/// Held lock. Released on drop.
pub struct LockGuard {
    _inner: Box<dyn Send>,
}

impl LockGuard {
    pub fn new(inner: impl Send + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Lock key for a subscription.
pub fn subscription_key(id: &SubscriptionId) -> String {
    format!("subscription:{}", id)
}

/// Lock key for a payment link that is not tied to a subscription.
pub fn payment_link_key(reference_id: &str) -> String {
    format!("payment-link:{}", reference_id)
}

#[async_trait]
pub trait SubscriptionLocker: Send + Sync {
    /// Wait for and take the lock identified by `key`.
    async fn lock(&self, key: &str) -> Result<LockGuard, DomainError>;
}
