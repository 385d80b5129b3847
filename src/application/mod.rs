//! Application layer - services and their wiring.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

pub use handlers::{
    BillingJobs, CreateFromQuoteCommand, CreateFromQuoteResult, JobReport, PaymentLedger,
    PaymentReconciler, ReconcileError, ReconcilerPorts, ReconcilerSettings,
    ReconciliationOutcome, SubscriptionLifecycle,
};

/// Every billing service, wired over one set of ports.
#[derive(Clone)]
pub struct BillingServices {
    pub ledger: Arc<PaymentLedger>,
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub reconciler: Arc<PaymentReconciler>,
    pub jobs: Arc<BillingJobs>,
}

impl BillingServices {
    pub fn wire(ports: ReconcilerPorts, settings: ReconcilerSettings, grace_period_days: u32) -> Self {
        let ledger = Arc::new(PaymentLedger::new(
            ports.subscriptions.clone(),
            ports.events.clone(),
            ports.book.clone(),
            ports.locker.clone(),
        ));
        let lifecycle = Arc::new(SubscriptionLifecycle::new(
            ports.subscriptions.clone(),
            ports.events.clone(),
            ledger.clone(),
            ports.locker.clone(),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            ports.clone(),
            ledger.clone(),
            settings,
        ));
        let jobs = Arc::new(BillingJobs::new(
            ports.subscriptions.clone(),
            ports.events.clone(),
            ports.links.clone(),
            lifecycle.clone(),
            reconciler.clone(),
            ports.clock.clone(),
            grace_period_days,
        ));
        Self {
            ledger,
            lifecycle,
            reconciler,
            jobs,
        }
    }
}
