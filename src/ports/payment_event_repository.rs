//! Payment event repository port.
//!
//! The at-most-one-pending rule and single settlement are enforced here
//! with atomic storage operations, so they hold even across processes.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{DomainError, PaymentEventId, SubscriptionId};
use crate::domain::ledger::PaymentEvent;

#[async_trait]
pub trait PaymentEventRepository: Send + Sync {
    /// Insert a pending event unless the subscription already has one.
    ///
    /// Returns `false` without writing when a pending event exists.
    async fn insert_if_no_pending(&self, event: &PaymentEvent) -> Result<bool, DomainError>;

    async fn find_by_id(&self, id: &PaymentEventId) -> Result<Option<PaymentEvent>, DomainError>;

    async fn find_pending_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<PaymentEvent>, DomainError>;

    /// Events of a subscription ordered by expected date.
    async fn list_for(&self, subscription_id: &SubscriptionId)
        -> Result<Vec<PaymentEvent>, DomainError>;

    /// Compare-and-swap pending -> paid.
    ///
    /// Returns `false` if the event was not pending.
    async fn mark_paid(&self, id: &PaymentEventId, paid_date: NaiveDate)
        -> Result<bool, DomainError>;

    /// Compare-and-swap paid -> pending, clearing the paid date.
    ///
    /// Rolls back a settlement whose later writes failed. Returns `false`
    /// if the event was not paid or its subscription has another pending
    /// event.
    async fn reopen(&self, id: &PaymentEventId) -> Result<bool, DomainError>;

    /// Delete pending events of a subscription. Returns the number removed.
    async fn delete_pending_for(&self, subscription_id: &SubscriptionId)
        -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_event_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PaymentEventRepository) {}
    }
}
