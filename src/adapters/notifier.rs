//! Receipt delivery adapters.

use async_trait::async_trait;

use crate::domain::ledger::Receipt;
use crate::domain::reconciliation::PaymentLink;
use crate::ports::{NotifyError, ReceiptNotifier};

/// Notifier that records receipt deliveries in the structured log.
///
/// Stands in for the mail sender until one is wired; receipts are still
/// persisted by the reconciler either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReceiptNotifier;

#[async_trait]
impl ReceiptNotifier for LoggingReceiptNotifier {
    async fn deliver(&self, receipt: &Receipt, link: &PaymentLink) -> Result<(), NotifyError> {
        let recipient = receipt
            .payer_email
            .as_deref()
            .or(link.payer_email.as_deref())
            .ok_or_else(|| NotifyError::NoRecipient(receipt.receipt_number.clone()))?;

        tracing::info!(
            receipt_number = %receipt.receipt_number,
            reference_id = %link.reference_id,
            recipient = %recipient,
            amount = receipt.amount,
            "Receipt delivered"
        );
        Ok(())
    }
}
