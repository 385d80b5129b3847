//! In-memory subscription repository.
//!
//! Useful for testing and single-process development. Shares its event
//! store with [`InMemoryPaymentEventRepository`] so deletes cascade.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::InMemoryPaymentEventRepository;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId};
use crate::domain::subscription::{PaymentType, ReferenceId, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
    events: Option<InMemoryPaymentEventRepository>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cascade subscription deletes into `events`.
    pub fn with_events(events: InMemoryPaymentEventRepository) -> Self {
        Self {
            subscriptions: Arc::default(),
            events: Some(events),
        }
    }

    pub async fn count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subs = self.subscriptions.write().await;
        if subs
            .values()
            .any(|s| s.reference_id == subscription.reference_id)
        {
            return Err(DomainError::validation(
                "reference_id",
                format!("Reference {} already exists", subscription.reference_id),
            ));
        }
        subs.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subs = self.subscriptions.write().await;
        match subs.get_mut(&subscription.id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            )),
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &ReferenceId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .find(|s| &s.reference_id == reference_id)
            .cloned())
    }

    async fn next_reference_sequence(&self, payment_type: PaymentType) -> Result<u64, DomainError> {
        let prefix = payment_type.reference_prefix();
        let max = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.reference_id.as_str().starts_with(prefix))
            .filter_map(|s| s.reference_id.sequence())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, DomainError> {
        let mut found: Vec<Subscription> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.reference_id.as_str().cmp(b.reference_id.as_str()));
        Ok(found)
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<(), DomainError> {
        let removed = self.subscriptions.write().await.remove(id);
        if removed.is_none() {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", id),
            ));
        }
        if let Some(events) = &self.events {
            events.remove_all_for(id).await;
        }
        Ok(())
    }
}
