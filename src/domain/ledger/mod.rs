//! Ledger domain module.
//!
//! - `payment_event` - authoritative billing occurrences per subscription
//! - `payment` - accounting side-ledger (payments and transactions)
//! - `receipt` - receipts issued for paid payment links

mod payment;
mod payment_event;
mod receipt;

pub use payment::{
    Payment, PaymentStatus, Transaction, TransactionKind, PAYMENT_LINK_CATEGORY,
    SUBSCRIPTION_CATEGORY,
};
pub use payment_event::{PaymentEvent, PaymentEventStatus};
pub use receipt::Receipt;
