//! In-memory accounting side-ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId};
use crate::domain::ledger::{Payment, Receipt, Transaction};
use crate::ports::LedgerRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    transactions: Arc<RwLock<Vec<Transaction>>>,
    receipts: Arc<RwLock<Vec<Receipt>>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn receipt_count(&self) -> usize {
        self.receipts.read().await.len()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn save_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        self.payments.write().await.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(&payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            )),
        }
    }

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<(), DomainError> {
        self.transactions.write().await.push(transaction.clone());
        Ok(())
    }

    async fn transaction_exists_for_payment(&self, id: &PaymentId) -> Result<bool, DomainError> {
        Ok(self
            .transactions
            .read()
            .await
            .iter()
            .any(|t| t.payment_id.as_ref() == Some(id)))
    }

    async fn transaction_exists_for_reference(
        &self,
        reference: &str,
    ) -> Result<bool, DomainError> {
        Ok(self
            .transactions
            .read()
            .await
            .iter()
            .any(|t| t.source_reference.as_deref() == Some(reference)))
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, DomainError> {
        Ok(self.transactions.read().await.clone())
    }

    async fn save_receipt(&self, receipt: &Receipt) -> Result<(), DomainError> {
        let mut receipts = self.receipts.write().await;
        if receipts
            .iter()
            .any(|r| r.payment_link_reference == receipt.payment_link_reference)
        {
            return Err(DomainError::validation(
                "payment_link_reference",
                format!("Receipt for {} already exists", receipt.payment_link_reference),
            ));
        }
        receipts.push(receipt.clone());
        Ok(())
    }

    async fn find_receipt_by_link_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Receipt>, DomainError> {
        Ok(self
            .receipts
            .read()
            .await
            .iter()
            .find(|r| r.payment_link_reference == reference)
            .cloned())
    }
}
