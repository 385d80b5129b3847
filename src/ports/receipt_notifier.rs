//! Receipt delivery port.
//!
//! Rendering the PDF and e-mailing it happen outside billing. A delivery
//! failure never reopens a settled payment.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ledger::Receipt;
use crate::domain::reconciliation::PaymentLink;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("No recipient address for receipt {0}")]
    NoRecipient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ReceiptNotifier: Send + Sync {
    /// Render and send the receipt for a paid link.
    async fn deliver(&self, receipt: &Receipt, link: &PaymentLink) -> Result<(), NotifyError>;
}
