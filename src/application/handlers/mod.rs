//! Application handlers.
//!
//! Services that orchestrate domain operations over the ports.

pub mod jobs;
pub mod ledger;
pub mod reconciliation;
pub mod subscription;

pub use jobs::{BillingJobs, JobReport};
pub use ledger::{PaymentLedger, ACTIVATION_NOTE, AUTO_RENEWAL_NOTE};
pub use reconciliation::{
    PaymentReconciler, ReconcileError, ReconcilerPorts, ReconcilerSettings,
    ReconciliationOutcome,
};
pub use subscription::{CreateFromQuoteCommand, CreateFromQuoteResult, SubscriptionLifecycle};
