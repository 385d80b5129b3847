//! In-memory payment event repository.
//!
//! The pending check and the insert happen under one write lock, which is
//! what makes `insert_if_no_pending` atomic.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, PaymentEventId, SubscriptionId};
use crate::domain::ledger::{PaymentEvent, PaymentEventStatus};
use crate::ports::PaymentEventRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentEventRepository {
    events: Arc<RwLock<HashMap<PaymentEventId, PaymentEvent>>>,
}

impl InMemoryPaymentEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending events for a subscription.
    pub async fn pending_count(&self, subscription_id: &SubscriptionId) -> usize {
        self.events
            .read()
            .await
            .values()
            .filter(|e| &e.subscription_id == subscription_id && e.is_pending())
            .count()
    }

    pub(crate) async fn remove_all_for(&self, subscription_id: &SubscriptionId) {
        self.events
            .write()
            .await
            .retain(|_, e| &e.subscription_id != subscription_id);
    }
}

#[async_trait]
impl PaymentEventRepository for InMemoryPaymentEventRepository {
    async fn insert_if_no_pending(&self, event: &PaymentEvent) -> Result<bool, DomainError> {
        let mut events = self.events.write().await;
        let has_pending = events
            .values()
            .any(|e| e.subscription_id == event.subscription_id && e.is_pending());
        if has_pending {
            return Ok(false);
        }
        events.insert(event.id, event.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: &PaymentEventId) -> Result<Option<PaymentEvent>, DomainError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn find_pending_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<PaymentEvent>, DomainError> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .find(|e| &e.subscription_id == subscription_id && e.is_pending())
            .cloned())
    }

    async fn list_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<PaymentEvent>, DomainError> {
        let mut list: Vec<PaymentEvent> = self
            .events
            .read()
            .await
            .values()
            .filter(|e| &e.subscription_id == subscription_id)
            .cloned()
            .collect();
        list.sort_by_key(|e| (e.expected_date, e.created_at));
        Ok(list)
    }

    async fn mark_paid(
        &self,
        id: &PaymentEventId,
        paid_date: NaiveDate,
    ) -> Result<bool, DomainError> {
        let mut events = self.events.write().await;
        match events.get_mut(id) {
            Some(event) if event.status == PaymentEventStatus::Pending => {
                event.mark_paid(paid_date)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reopen(&self, id: &PaymentEventId) -> Result<bool, DomainError> {
        let mut events = self.events.write().await;
        let Some(subscription_id) = events
            .get(id)
            .filter(|e| e.status == PaymentEventStatus::Paid)
            .map(|e| e.subscription_id)
        else {
            return Ok(false);
        };
        if events
            .values()
            .any(|e| e.subscription_id == subscription_id && e.is_pending())
        {
            return Ok(false);
        }
        if let Some(event) = events.get_mut(id) {
            event.status = PaymentEventStatus::Pending;
            event.paid_date = None;
        }
        Ok(true)
    }

    async fn delete_pending_for(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<u64, DomainError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|_, e| !(&e.subscription_id == subscription_id && e.is_pending()));
        Ok((before - events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[tokio::test]
    async fn second_pending_insert_is_refused() {
        let repo = InMemoryPaymentEventRepository::new();
        let sub = SubscriptionId::new();
        let first = PaymentEvent::pending(sub, d(1), 100, "").unwrap();
        let second = PaymentEvent::pending(sub, d(2), 100, "").unwrap();

        assert!(repo.insert_if_no_pending(&first).await.unwrap());
        assert!(!repo.insert_if_no_pending(&second).await.unwrap());
        assert_eq!(repo.pending_count(&sub).await, 1);
    }

    #[tokio::test]
    async fn mark_paid_is_compare_and_swap() {
        let repo = InMemoryPaymentEventRepository::new();
        let event = PaymentEvent::pending(SubscriptionId::new(), d(1), 100, "").unwrap();
        repo.insert_if_no_pending(&event).await.unwrap();

        assert!(repo.mark_paid(&event.id, d(3)).await.unwrap());
        assert!(!repo.mark_paid(&event.id, d(4)).await.unwrap());
        let stored = repo.find_by_id(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.paid_date, Some(d(3)));
    }

    #[tokio::test]
    async fn reopen_undoes_settlement_once() {
        let repo = InMemoryPaymentEventRepository::new();
        let event = PaymentEvent::pending(SubscriptionId::new(), d(1), 100, "").unwrap();
        repo.insert_if_no_pending(&event).await.unwrap();
        repo.mark_paid(&event.id, d(2)).await.unwrap();

        assert!(repo.reopen(&event.id).await.unwrap());
        assert!(!repo.reopen(&event.id).await.unwrap());
        let stored = repo.find_by_id(&event.id).await.unwrap().unwrap();
        assert!(stored.is_pending());
        assert_eq!(stored.paid_date, None);
    }

    #[tokio::test]
    async fn reopen_refuses_second_pending() {
        let repo = InMemoryPaymentEventRepository::new();
        let sub = SubscriptionId::new();
        let paid = PaymentEvent::pending(sub, d(1), 100, "").unwrap();
        repo.insert_if_no_pending(&paid).await.unwrap();
        repo.mark_paid(&paid.id, d(1)).await.unwrap();
        let next = PaymentEvent::pending(sub, d(28), 100, "").unwrap();
        repo.insert_if_no_pending(&next).await.unwrap();

        assert!(!repo.reopen(&paid.id).await.unwrap());
        assert_eq!(repo.pending_count(&sub).await, 1);
    }

    #[tokio::test]
    async fn delete_pending_keeps_paid_history() {
        let repo = InMemoryPaymentEventRepository::new();
        let sub = SubscriptionId::new();
        let paid = PaymentEvent::pending(sub, d(1), 100, "").unwrap();
        repo.insert_if_no_pending(&paid).await.unwrap();
        repo.mark_paid(&paid.id, d(1)).await.unwrap();
        let pending = PaymentEvent::pending(sub, d(28), 100, "").unwrap();
        repo.insert_if_no_pending(&pending).await.unwrap();

        assert_eq!(repo.delete_pending_for(&sub).await.unwrap(), 1);
        assert_eq!(repo.list_for(&sub).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_leave_one_pending() {
        let repo = InMemoryPaymentEventRepository::new();
        let sub = SubscriptionId::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let event = PaymentEvent::pending(sub, d(1 + i % 20), 100, "").unwrap();
                    repo.insert_if_no_pending(&event).await.unwrap()
                })
            })
            .collect();
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(repo.pending_count(&sub).await, 1);
    }
}
