//! In-memory payment link repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentEventId, PaymentLinkId, Timestamp};
use crate::domain::reconciliation::{PaymentLink, PaymentLinkStatus};
use crate::ports::PaymentLinkRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentLinkRepository {
    links: Arc<RwLock<HashMap<PaymentLinkId, PaymentLink>>>,
}

impl InMemoryPaymentLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PaymentLink> {
        self.links.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PaymentLinkRepository for InMemoryPaymentLinkRepository {
    async fn save(&self, link: &PaymentLink) -> Result<(), DomainError> {
        let mut links = self.links.write().await;
        if links.values().any(|l| l.reference_id == link.reference_id) {
            return Err(DomainError::validation(
                "reference_id",
                format!("Payment link {} already exists", link.reference_id),
            ));
        }
        links.insert(link.id, link.clone());
        Ok(())
    }

    async fn update(&self, link: &PaymentLink) -> Result<(), DomainError> {
        let mut links = self.links.write().await;
        match links.get_mut(&link.id) {
            Some(existing) => {
                *existing = link.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PaymentLinkNotFound,
                format!("Payment link {} not found", link.reference_id),
            )),
        }
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<PaymentLink>, DomainError> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .find(|l| l.reference_id == reference_id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentLink>, DomainError> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .find(|l| l.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_open_for_event(
        &self,
        event_id: &PaymentEventId,
        now: Timestamp,
    ) -> Result<Option<PaymentLink>, DomainError> {
        Ok(self
            .links
            .read()
            .await
            .values()
            .find(|l| l.payment_event_id.as_ref() == Some(event_id) && l.is_open(now))
            .cloned())
    }

    async fn find_pending(&self) -> Result<Vec<PaymentLink>, DomainError> {
        let mut pending: Vec<PaymentLink> = self
            .links
            .read()
            .await
            .values()
            .filter(|l| l.status == PaymentLinkStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|l| l.created_at);
        Ok(pending)
    }
}
