//! In-memory wiring shared by application tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    BillingJobs, BillingServices, PaymentReconciler, ReconcilerPorts, ReconcilerSettings,
    SubscriptionLifecycle,
};
use crate::adapters::clock::FixedClock;
use crate::adapters::gateways::MockGateway;
use crate::adapters::memory::{
    InMemoryLedgerRepository, InMemoryPaymentEventRepository, InMemoryPaymentLinkRepository,
    InMemorySubscriptionRepository, InProcessSubscriptionLocker,
};
use crate::domain::foundation::{ApplicationId, ClientId, DomainError, SubscriptionId, Timestamp};
use crate::domain::ledger::Receipt;
use crate::domain::reconciliation::{Gateway, PaymentLink};
use crate::domain::subscription::{
    PaymentType, ReferenceId, Subscription, SubscriptionStatus, SubscriptionTerms,
};
use crate::ports::{
    Clock, NotifyError, PaymentGateways, ReceiptNotifier, SubscriptionRepository,
};

/// Notifier that remembers receipt numbers and can be told to fail.
#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub(crate) fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub(crate) fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReceiptNotifier for RecordingNotifier {
    async fn deliver(&self, receipt: &Receipt, _link: &PaymentLink) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("smtp down".into()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push(receipt.receipt_number.clone());
        Ok(())
    }
}

/// Subscription store that can be told to fail one `update` or `save`.
#[derive(Clone)]
pub(crate) struct FlakySubscriptions {
    inner: InMemorySubscriptionRepository,
    fail_update: Arc<AtomicBool>,
    saves_before_failure: Arc<Mutex<Option<usize>>>,
}

impl FlakySubscriptions {
    pub(crate) fn new(inner: InMemorySubscriptionRepository) -> Self {
        Self {
            inner,
            fail_update: Arc::default(),
            saves_before_failure: Arc::default(),
        }
    }

    pub(crate) fn fail_next_update(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    /// Let `saves` more saves through, then fail the one after.
    pub(crate) fn fail_save_after(&self, saves: usize) {
        *self.saves_before_failure.lock().unwrap() = Some(saves);
    }

    fn transient() -> DomainError {
        DomainError::database("transient")
    }
}

#[async_trait]
impl SubscriptionRepository for FlakySubscriptions {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        {
            let mut remaining = self.saves_before_failure.lock().unwrap();
            match *remaining {
                Some(0) => {
                    *remaining = None;
                    return Err(Self::transient());
                }
                Some(n) => *remaining = Some(n - 1),
                None => {}
            }
        }
        self.inner.save(subscription).await
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        if self.fail_update.swap(false, Ordering::SeqCst) {
            return Err(Self::transient());
        }
        self.inner.update(subscription).await
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &ReferenceId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_by_reference_id(reference_id).await
    }

    async fn next_reference_sequence(&self, payment_type: PaymentType) -> Result<u64, DomainError> {
        self.inner.next_reference_sequence(payment_type).await
    }

    async fn find_by_status(
        &self,
        status: SubscriptionStatus,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.inner.find_by_status(status).await
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<(), DomainError> {
        self.inner.delete(id).await
    }
}

pub(crate) struct Harness {
    pub subs: InMemorySubscriptionRepository,
    pub events: InMemoryPaymentEventRepository,
    pub links: InMemoryPaymentLinkRepository,
    pub book: InMemoryLedgerRepository,
    pub clock: FixedClock,
    pub mercadopago: MockGateway,
    pub flow: MockGateway,
    pub notifier: RecordingNotifier,
    pub services: BillingServices,
}

impl Harness {
    /// Clock starts at 2025-03-01 12:00 UTC.
    pub(crate) fn new() -> Self {
        Self::wrapping_subscriptions(|subs| Arc::new(subs))
    }

    /// Like `new`, with the services seeing `wrap(subs)` instead of `subs`.
    pub(crate) fn wrapping_subscriptions(
        wrap: impl FnOnce(InMemorySubscriptionRepository) -> Arc<dyn SubscriptionRepository>,
    ) -> Self {
        let events = InMemoryPaymentEventRepository::new();
        let subs = InMemorySubscriptionRepository::with_events(events.clone());
        let links = InMemoryPaymentLinkRepository::new();
        let book = InMemoryLedgerRepository::new();
        let clock = FixedClock::new(Timestamp::from_datetime(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let mercadopago = MockGateway::new(Gateway::MercadoPago);
        let flow = MockGateway::new(Gateway::Flow);
        let notifier = RecordingNotifier::default();

        let ports = ReconcilerPorts {
            links: Arc::new(links.clone()),
            subscriptions: wrap(subs.clone()),
            events: Arc::new(events.clone()),
            book: Arc::new(book.clone()),
            locker: Arc::new(InProcessSubscriptionLocker::new()),
            gateways: PaymentGateways::new()
                .with(Arc::new(mercadopago.clone()))
                .with(Arc::new(flow.clone())),
            notifier: Arc::new(notifier.clone()),
            clock: Arc::new(clock.clone()),
        };
        let services = BillingServices::wire(ports, ReconcilerSettings::default(), 15);

        Self {
            subs,
            events,
            links,
            book,
            clock,
            mercadopago,
            flow,
            notifier,
            services,
        }
    }

    pub(crate) fn lifecycle(&self) -> &SubscriptionLifecycle {
        &self.services.lifecycle
    }

    pub(crate) fn reconciler(&self) -> &PaymentReconciler {
        &self.services.reconciler
    }

    pub(crate) fn jobs(&self) -> &BillingJobs {
        &self.services.jobs
    }

    /// Monthly subscription starting today, activated, with its first
    /// pending event.
    pub(crate) async fn active_subscription(&self, price: i64) -> Subscription {
        self.activated(price, false).await
    }

    pub(crate) async fn active_auto_renewing_subscription(&self, price: i64) -> Subscription {
        self.activated(price, true).await
    }

    async fn activated(&self, price: i64, auto_renewal: bool) -> Subscription {
        let created = self
            .lifecycle()
            .create(SubscriptionTerms {
                client_id: ClientId::new(),
                application_id: ApplicationId::new(),
                payment_type: PaymentType::Monthly,
                price,
                start_date: self.clock.today(),
                auto_renewal,
                quote_id: None,
                notes: String::new(),
            })
            .await
            .unwrap();
        assert!(self.lifecycle().activate(&created.id).await.unwrap());
        self.subs.find_by_id(&created.id).await.unwrap().unwrap()
    }
}
