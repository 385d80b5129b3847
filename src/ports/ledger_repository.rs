//! Accounting side-ledger repository port.
//!
//! Covers payments, income/expense transactions and receipts. Creation is
//! guarded by existence checks performed by callers under the subscription
//! lock.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId};
use crate::domain::ledger::{Payment, Receipt, Transaction};

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn save_payment(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn update_payment(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn find_payment(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    async fn save_transaction(&self, transaction: &Transaction) -> Result<(), DomainError>;

    /// True if a transaction was already booked for this payment.
    async fn transaction_exists_for_payment(&self, id: &PaymentId) -> Result<bool, DomainError>;

    /// True if a transaction was already booked for this payment link reference.
    async fn transaction_exists_for_reference(&self, reference: &str)
        -> Result<bool, DomainError>;

    async fn list_transactions(&self) -> Result<Vec<Transaction>, DomainError>;

    async fn save_receipt(&self, receipt: &Receipt) -> Result<(), DomainError>;

    async fn find_receipt_by_link_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Receipt>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn LedgerRepository) {}
    }
}
