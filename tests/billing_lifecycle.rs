//! End-to-end billing lifecycle over the in-memory adapters.
//!
//! Walks a subscription through activation, settlement, cancellation and
//! expiry using only the crate's public API.

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

use forgeapp_billing::adapters::gateways::MockGateway;
use forgeapp_billing::adapters::memory::{
    InMemoryLedgerRepository, InMemoryPaymentEventRepository, InMemoryPaymentLinkRepository,
    InMemorySubscriptionRepository, InProcessSubscriptionLocker,
};
use forgeapp_billing::adapters::{FixedClock, LoggingReceiptNotifier};
use forgeapp_billing::application::{BillingServices, ReconcilerPorts, ReconcilerSettings};
use forgeapp_billing::domain::foundation::{ApplicationId, ClientId, Timestamp};
use forgeapp_billing::domain::ledger::PaymentEventStatus;
use forgeapp_billing::domain::reconciliation::Gateway;
use forgeapp_billing::domain::subscription::{
    Application, Client, Nationality, PaymentType, Subscription, SubscriptionStatus,
    SubscriptionTerms, TaxId,
};
use forgeapp_billing::ports::{PaymentEventRepository, PaymentGateways, SubscriptionRepository};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Billing {
    subs: InMemorySubscriptionRepository,
    events: InMemoryPaymentEventRepository,
    links: InMemoryPaymentLinkRepository,
    book: InMemoryLedgerRepository,
    clock: FixedClock,
    services: BillingServices,
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn billing() -> Billing {
    let events = InMemoryPaymentEventRepository::new();
    let subs = InMemorySubscriptionRepository::with_events(events.clone());
    let links = InMemoryPaymentLinkRepository::new();
    let book = InMemoryLedgerRepository::new();
    let clock = FixedClock::new(Timestamp::from_datetime(
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
    ));

    let ports = ReconcilerPorts {
        links: Arc::new(links.clone()),
        subscriptions: Arc::new(subs.clone()),
        events: Arc::new(events.clone()),
        book: Arc::new(book.clone()),
        locker: Arc::new(InProcessSubscriptionLocker::new()),
        gateways: PaymentGateways::new()
            .with(Arc::new(MockGateway::new(Gateway::MercadoPago)))
            .with(Arc::new(MockGateway::new(Gateway::Flow))),
        notifier: Arc::new(LoggingReceiptNotifier),
        clock: Arc::new(clock.clone()),
    };
    let services = BillingServices::wire(ports, ReconcilerSettings::default(), 15);

    Billing {
        subs,
        events,
        links,
        book,
        clock,
        services,
    }
}

async fn pending_monthly(b: &Billing, auto_renewal: bool) -> Subscription {
    let client = Client::new(
        ClientId::new(),
        TaxId::new("12345678-9").unwrap(),
        "Camila",
        "Soto",
        "camila@example.cl",
        Nationality::Chilena,
    )
    .unwrap();
    let application = Application {
        id: ApplicationId::new(),
        name: "Back office".into(),
        description: "Inventory and invoicing".into(),
        owner: Some(client.id),
    };
    let terms = SubscriptionTerms::for_client(
        &client,
        &application,
        PaymentType::Monthly,
        50_000,
        d(2025, 3, 1),
    )
    .unwrap();

    b.services
        .lifecycle
        .create(SubscriptionTerms {
            auto_renewal,
            ..terms
        })
        .await
        .unwrap()
}

async fn reload(b: &Billing, sub: &Subscription) -> Subscription {
    b.subs.find_by_id(&sub.id).await.unwrap().unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn activation_creates_single_pending_event_on_start_date() {
    let b = billing();
    let sub = pending_monthly(&b, true).await;
    assert_eq!(sub.status, SubscriptionStatus::Pending);

    assert!(b.services.lifecycle.activate(&sub.id).await.unwrap());

    let stored = reload(&b, &sub).await;
    assert_eq!(stored.status, SubscriptionStatus::Active);
    let events = b.events.list_for(&sub.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].expected_date, d(2025, 3, 1));
    assert_eq!(events[0].amount, 50_000);
    assert_eq!(events[0].status, PaymentEventStatus::Pending);
}

#[tokio::test]
async fn settling_first_event_advances_period_and_chains_next() {
    let b = billing();
    let sub = pending_monthly(&b, true).await;
    b.services.lifecycle.activate(&sub.id).await.unwrap();
    let first = b.events.find_pending_for(&sub.id).await.unwrap().unwrap();

    assert!(b.services.ledger.mark_as_paid(&first.id, d(2025, 3, 1)).await.unwrap());

    let stored = reload(&b, &sub).await;
    assert_eq!(stored.last_payment_date, Some(d(2025, 3, 1)));
    assert_eq!(stored.next_payment_date, Some(d(2025, 4, 1)));
    let next = b.events.find_pending_for(&sub.id).await.unwrap().unwrap();
    assert_eq!(next.expected_date, d(2025, 4, 1));
    assert_ne!(next.id, first.id);

    // Settling the same event again changes nothing
    assert!(!b.services.ledger.mark_as_paid(&first.id, d(2025, 3, 1)).await.unwrap());
    assert_eq!(b.events.list_for(&sub.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn approved_notification_for_unknown_reference_writes_nothing() {
    let b = billing();

    let outcome = b
        .services
        .reconciler
        .update_payment_status("PL-DOES-NOT-EXIST", "approved", &json!({ "status": "approved" }))
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(b.links.all().await.is_empty());
    assert_eq!(b.book.transaction_count().await, 0);
    assert_eq!(b.book.receipt_count().await, 0);
    assert_eq!(b.subs.count().await, 0);
}

#[tokio::test]
async fn cancel_drops_unpaid_pending_event() {
    let b = billing();
    let sub = pending_monthly(&b, false).await;
    b.services.lifecycle.activate(&sub.id).await.unwrap();
    assert_eq!(b.events.pending_count(&sub.id).await, 1);

    assert!(b.services.lifecycle.cancel(&sub.id).await.unwrap());

    assert_eq!(b.events.pending_count(&sub.id).await, 0);
    assert_eq!(reload(&b, &sub).await.status, SubscriptionStatus::Cancelled);
}

#[tokio::test]
async fn overdue_subscription_expires_once() {
    let b = billing();
    let sub = pending_monthly(&b, false).await;
    b.services.lifecycle.activate(&sub.id).await.unwrap();
    let grace_end = reload(&b, &sub).await.grace_period_end(15);
    let today = grace_end + chrono::Duration::days(1);

    let first = b
        .services
        .jobs
        .expire_overdue_subscriptions(today, false)
        .await
        .unwrap();
    assert_eq!(first.changed, 1);
    assert_eq!(reload(&b, &sub).await.status, SubscriptionStatus::Expired);

    let second = b
        .services
        .jobs
        .expire_overdue_subscriptions(today, false)
        .await
        .unwrap();
    assert_eq!(second.changed, 0);
}

#[tokio::test]
async fn subscription_within_grace_period_stays_active() {
    let b = billing();
    let sub = pending_monthly(&b, false).await;
    b.services.lifecycle.activate(&sub.id).await.unwrap();
    let grace_end = reload(&b, &sub).await.grace_period_end(15);

    b.services
        .jobs
        .expire_overdue_subscriptions(grace_end, false)
        .await
        .unwrap();

    assert_eq!(reload(&b, &sub).await.status, SubscriptionStatus::Active);
}

// =============================================================================
// Checkout through settlement
// =============================================================================

#[tokio::test]
async fn paid_checkout_settles_subscription_and_books_income() {
    let b = billing();
    let sub = pending_monthly(&b, true).await;
    b.services.lifecycle.activate(&sub.id).await.unwrap();
    let link = b
        .services
        .reconciler
        .create_payment_link(&sub.id, None)
        .await
        .unwrap();
    b.clock.advance_days(1);

    let outcome = b
        .services
        .reconciler
        .update_payment_status(&link.reference_id, "approved", &json!({ "status": "approved" }))
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.newly_paid);
    assert!(outcome.link.is_paid());
    let stored = reload(&b, &sub).await;
    assert_eq!(stored.last_payment_date, Some(d(2025, 3, 2)));
    assert_eq!(stored.next_payment_date, Some(d(2025, 4, 1)));
    assert_eq!(b.book.transaction_count().await, 1);
    assert_eq!(b.book.receipt_count().await, 1);
}
