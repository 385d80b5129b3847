//! Payment link repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentEventId, Timestamp};
use crate::domain::reconciliation::PaymentLink;

#[async_trait]
pub trait PaymentLinkRepository: Send + Sync {
    /// # Errors
    ///
    /// - `ValidationFailed` if the reference id is taken
    async fn save(&self, link: &PaymentLink) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// - `PaymentLinkNotFound` if it doesn't exist
    async fn update(&self, link: &PaymentLink) -> Result<(), DomainError>;

    async fn find_by_reference_id(&self, reference_id: &str)
        -> Result<Option<PaymentLink>, DomainError>;

    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<PaymentLink>, DomainError>;

    /// Pending, unexpired link already issued for this event.
    async fn find_open_for_event(
        &self,
        event_id: &PaymentEventId,
        now: Timestamp,
    ) -> Result<Option<PaymentLink>, DomainError>;

    /// Every link still in pending status, expired or not.
    async fn find_pending(&self) -> Result<Vec<PaymentLink>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_link_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PaymentLinkRepository) {}
    }
}
