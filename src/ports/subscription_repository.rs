//! Subscription repository port.
//!
//! Defines the contract for persisting and retrieving Subscription aggregates.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::domain::subscription::{PaymentType, ReferenceId, Subscription, SubscriptionStatus};

/// Repository port for Subscription aggregate persistence.
///
/// Implementations must enforce a unique `reference_id`.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Save a new subscription.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` with detail `field=reference_id` if the
    ///   reference id is taken
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if it doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_reference_id(
        &self,
        reference_id: &ReferenceId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Highest sequential reference number issued for this cadence plus one.
    async fn next_reference_sequence(&self, payment_type: PaymentType) -> Result<u64, DomainError>;

    /// All subscriptions in the given status. Used by batch jobs.
    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Delete a subscription together with its payment events.
    async fn delete(&self, id: &SubscriptionId) -> Result<(), DomainError>;
}
