//! Gateway reconciliation handlers.
//!
//! - `payment_reconciler` - status application, successful-payment side effects
//! - `gateway_entry` - webhook, return, refresh and checkout entry points

mod gateway_entry;
mod payment_reconciler;

pub use payment_reconciler::{
    PaymentReconciler, ReconcileError, ReconcilerPorts, ReconcilerSettings,
    ReconciliationOutcome,
};
