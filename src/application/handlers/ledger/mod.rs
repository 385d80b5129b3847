//! Payment event ledger handlers.

mod payment_ledger;

pub use payment_ledger::{PaymentLedger, ACTIVATION_NOTE, AUTO_RENEWAL_NOTE};
