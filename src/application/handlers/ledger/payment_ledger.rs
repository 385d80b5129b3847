//! PaymentLedger - creation and settlement of payment events.
//!
//! Settlement is the only operation that advances a subscription's billing
//! dates. Both creation and settlement run under the subscription lock;
//! storage adds an atomic pending guard and a compare-and-swap on top.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentEventId, PaymentId, SubscriptionId,
};
use crate::domain::ledger::{Payment, PaymentEvent, Transaction};
use crate::domain::subscription::Subscription;
use crate::ports::{
    subscription_key, LedgerRepository, PaymentEventRepository, SubscriptionLocker,
    SubscriptionRepository,
};

/// Note attached to the event created on activation or renewal.
pub const ACTIVATION_NOTE: &str = "Generated on activation (advance payment)";

/// Note attached to events chained by auto-renewal.
pub const AUTO_RENEWAL_NOTE: &str = "Generated by auto-renewal";

pub struct PaymentLedger {
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn PaymentEventRepository>,
    ledger: Arc<dyn LedgerRepository>,
    locker: Arc<dyn SubscriptionLocker>,
}

impl PaymentLedger {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn PaymentEventRepository>,
        ledger: Arc<dyn LedgerRepository>,
        locker: Arc<dyn SubscriptionLocker>,
    ) -> Self {
        Self {
            subscriptions,
            events,
            ledger,
            locker,
        }
    }

    /// Create a pending event unless one already exists.
    ///
    /// Returns `Ok(None)` when the subscription already has a pending event.
    pub async fn create_pending_event(
        &self,
        subscription: &Subscription,
        expected_date: NaiveDate,
        amount: i64,
        notes: &str,
    ) -> Result<Option<PaymentEvent>, DomainError> {
        let _guard = self.locker.lock(&subscription_key(&subscription.id)).await?;
        self.insert_pending(subscription.id, expected_date, amount, notes)
            .await
    }

    /// Insert a pending event. Caller must hold the subscription lock.
    pub(crate) async fn insert_pending(
        &self,
        subscription_id: SubscriptionId,
        expected_date: NaiveDate,
        amount: i64,
        notes: &str,
    ) -> Result<Option<PaymentEvent>, DomainError> {
        let event = PaymentEvent::pending(subscription_id, expected_date, amount, notes)?;
        if !self.events.insert_if_no_pending(&event).await? {
            tracing::info!(
                subscription_id = %subscription_id,
                "Pending payment event already exists, not creating another"
            );
            return Ok(None);
        }
        tracing::info!(
            subscription_id = %subscription_id,
            event_id = %event.id,
            expected_date = %expected_date,
            amount = amount,
            "Created pending payment event"
        );
        Ok(Some(event))
    }

    /// Settle an event and advance its subscription.
    ///
    /// Returns `Ok(false)` if the event was already paid.
    ///
    /// # Errors
    ///
    /// - `PaymentEventNotFound` if the event does not exist
    /// - `SubscriptionNotFound` if its subscription is gone
    pub async fn mark_as_paid(
        &self,
        event_id: &PaymentEventId,
        paid_date: NaiveDate,
    ) -> Result<bool, DomainError> {
        let event = self.find_event(event_id).await?;
        let _guard = self
            .locker
            .lock(&subscription_key(&event.subscription_id))
            .await?;
        self.settle(event_id, paid_date).await
    }

    /// Settlement body. Caller must hold the subscription lock.
    ///
    /// If a write after the event's compare-and-swap fails, the event is
    /// reopened so a redelivery can settle it again.
    pub(crate) async fn settle(
        &self,
        event_id: &PaymentEventId,
        paid_date: NaiveDate,
    ) -> Result<bool, DomainError> {
        let event = self.find_event(event_id).await?;
        if !event.is_pending() {
            tracing::info!(event_id = %event_id, "Payment event already paid");
            return Ok(false);
        }

        let mut subscription = self
            .subscriptions
            .find_by_id(&event.subscription_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription {} not found", event.subscription_id),
                )
            })?;
        subscription.record_payment(paid_date, event.expected_date)?;

        if !self.events.mark_paid(event_id, paid_date).await? {
            tracing::info!(event_id = %event_id, "Payment event settled concurrently");
            return Ok(false);
        }

        let chained = if subscription.auto_renewal {
            let next = self
                .insert_pending(
                    subscription.id,
                    subscription.current_period_end,
                    subscription.price,
                    AUTO_RENEWAL_NOTE,
                )
                .await;
            match next {
                Ok(next) => next.is_some(),
                Err(err) => {
                    self.roll_back_settlement(event_id, &subscription, false).await;
                    return Err(err);
                }
            }
        } else {
            false
        };
        if let Err(err) = self.subscriptions.update(&subscription).await {
            self.roll_back_settlement(event_id, &subscription, chained).await;
            return Err(err);
        }

        tracing::info!(
            reference_id = %subscription.reference_id,
            event_id = %event_id,
            paid_date = %paid_date,
            next_payment_date = ?subscription.next_payment_date,
            "Payment event settled"
        );
        Ok(true)
    }

    async fn roll_back_settlement(
        &self,
        event_id: &PaymentEventId,
        subscription: &Subscription,
        drop_chained: bool,
    ) {
        if drop_chained {
            if let Err(err) = self.events.delete_pending_for(&subscription.id).await {
                tracing::error!(
                    reference_id = %subscription.reference_id,
                    error = %err,
                    "Could not drop chained payment event"
                );
            }
        }
        match self.events.reopen(event_id).await {
            Ok(true) => tracing::warn!(
                reference_id = %subscription.reference_id,
                event_id = %event_id,
                "Settlement rolled back, payment event reopened"
            ),
            Ok(false) => tracing::error!(
                reference_id = %subscription.reference_id,
                event_id = %event_id,
                "Settlement rollback found the payment event not paid"
            ),
            Err(err) => tracing::error!(
                reference_id = %subscription.reference_id,
                event_id = %event_id,
                error = %err,
                "Could not reopen payment event"
            ),
        }
    }

    /// Complete a side-ledger payment and book its income once.
    ///
    /// Returns `Ok(false)` if the payment was not pending.
    pub async fn complete_payment(
        &self,
        payment_id: &PaymentId,
        on: NaiveDate,
        gateway_reference: Option<String>,
    ) -> Result<bool, DomainError> {
        let owner = self.find_payment(payment_id).await?.subscription_id;
        let _guard = match owner {
            Some(id) => Some(self.locker.lock(&subscription_key(&id)).await?),
            None => None,
        };

        let mut payment = self.find_payment(payment_id).await?;
        if let Err(err) = payment.complete(on, gateway_reference) {
            if err.is_invalid_transition() {
                tracing::info!(payment_id = %payment_id, "Payment not pending, skipping completion");
                return Ok(false);
            }
            return Err(err);
        }
        self.ledger.update_payment(&payment).await?;

        if self.ledger.transaction_exists_for_payment(payment_id).await? {
            tracing::info!(payment_id = %payment_id, "Transaction already booked for payment");
            return Ok(true);
        }
        let description = format!("Payment {}", payment.id);
        self.ledger
            .save_transaction(&Transaction::income_for_payment(&payment, description))
            .await?;
        Ok(true)
    }

    async fn find_payment(&self, payment_id: &PaymentId) -> Result<Payment, DomainError> {
        self.ledger.find_payment(payment_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment_id),
            )
        })
    }

    async fn find_event(&self, event_id: &PaymentEventId) -> Result<PaymentEvent, DomainError> {
        self.events.find_by_id(event_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::PaymentEventNotFound,
                format!("Payment event {} not found", event_id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryLedgerRepository, InMemoryPaymentEventRepository,
        InMemorySubscriptionRepository, InProcessSubscriptionLocker,
    };
    use crate::application::test_support::FlakySubscriptions;
    use crate::domain::foundation::{ApplicationId, ClientId};
    use crate::domain::ledger::PaymentStatus;
    use crate::domain::subscription::{
        PaymentType, ReferenceId, SubscriptionStatus, SubscriptionTerms,
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct Fixture {
        ledger: PaymentLedger,
        subs: InMemorySubscriptionRepository,
        events: InMemoryPaymentEventRepository,
        book: InMemoryLedgerRepository,
    }

    fn fixture() -> Fixture {
        let events = InMemoryPaymentEventRepository::new();
        let subs = InMemorySubscriptionRepository::with_events(events.clone());
        let book = InMemoryLedgerRepository::new();
        let ledger = PaymentLedger::new(
            Arc::new(subs.clone()),
            Arc::new(events.clone()),
            Arc::new(book.clone()),
            Arc::new(InProcessSubscriptionLocker::new()),
        );
        Fixture {
            ledger,
            subs,
            events,
            book,
        }
    }

    async fn active_subscription(f: &Fixture, auto_renewal: bool) -> Subscription {
        let mut sub = Subscription::create(
            SubscriptionId::new(),
            ReferenceId::sequential(PaymentType::Monthly, 1),
            SubscriptionTerms {
                client_id: ClientId::new(),
                application_id: ApplicationId::new(),
                payment_type: PaymentType::Monthly,
                price: 50_000,
                start_date: d(2025, 3, 1),
                auto_renewal,
                quote_id: None,
                notes: String::new(),
            },
        )
        .unwrap();
        sub.activate().unwrap();
        f.subs.save(&sub).await.unwrap();
        sub
    }

    #[tokio::test]
    async fn create_pending_event_refuses_second_pending() {
        let f = fixture();
        let sub = active_subscription(&f, true).await;

        let first = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap();
        let second = f
            .ledger
            .create_pending_event(&sub, d(2025, 4, 1), 50_000, "")
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(f.events.pending_count(&sub.id).await, 1);
    }

    #[tokio::test]
    async fn mark_as_paid_twice_returns_true_then_false() {
        let f = fixture();
        let sub = active_subscription(&f, false).await;
        let event = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();

        assert!(f.ledger.mark_as_paid(&event.id, d(2025, 3, 1)).await.unwrap());
        assert!(!f.ledger.mark_as_paid(&event.id, d(2025, 3, 2)).await.unwrap());

        let stored = f.subs.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.last_payment_date, Some(d(2025, 3, 1)));
    }

    #[tokio::test]
    async fn settlement_chains_next_event_when_auto_renewing() {
        let f = fixture();
        let sub = active_subscription(&f, true).await;
        let event = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();

        f.ledger.mark_as_paid(&event.id, d(2025, 3, 1)).await.unwrap();

        let stored = f.subs.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.next_payment_date, Some(d(2025, 4, 1)));
        let next = f.events.find_pending_for(&sub.id).await.unwrap().unwrap();
        assert_eq!(next.expected_date, d(2025, 4, 1));
        assert_eq!(next.amount, 50_000);
    }

    #[tokio::test]
    async fn settlement_without_auto_renewal_leaves_no_pending() {
        let f = fixture();
        let sub = active_subscription(&f, false).await;
        let event = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();

        f.ledger.mark_as_paid(&event.id, d(2025, 3, 1)).await.unwrap();
        assert_eq!(f.events.pending_count(&sub.id).await, 0);
    }

    #[tokio::test]
    async fn settlement_reactivates_expired_subscription() {
        let f = fixture();
        let mut sub = active_subscription(&f, false).await;
        let event = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();
        sub.expire().unwrap();
        f.subs.update(&sub).await.unwrap();

        f.ledger.mark_as_paid(&event.id, d(2025, 3, 20)).await.unwrap();
        let stored = f.subs.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn concurrent_settlement_happens_once() {
        let f = fixture();
        let sub = active_subscription(&f, true).await;
        let event = f
            .ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();
        let ledger = Arc::new(f.ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let id = event.id;
                tokio::spawn(async move { ledger.mark_as_paid(&id, d(2025, 3, 1)).await.unwrap() })
            })
            .collect();
        let mut settled = 0;
        for handle in handles {
            if handle.await.unwrap() {
                settled += 1;
            }
        }
        assert_eq!(settled, 1);
        assert_eq!(f.events.pending_count(&sub.id).await, 1);
    }

    #[tokio::test]
    async fn failed_subscription_update_reopens_event() {
        let f = fixture();
        let flaky = FlakySubscriptions::new(f.subs.clone());
        let ledger = PaymentLedger::new(
            Arc::new(flaky.clone()),
            Arc::new(f.events.clone()),
            Arc::new(f.book.clone()),
            Arc::new(InProcessSubscriptionLocker::new()),
        );
        let sub = active_subscription(&f, true).await;
        let event = ledger
            .create_pending_event(&sub, d(2025, 3, 1), 50_000, ACTIVATION_NOTE)
            .await
            .unwrap()
            .unwrap();

        flaky.fail_next_update();
        assert!(ledger.mark_as_paid(&event.id, d(2025, 3, 1)).await.is_err());

        let reopened = f.events.find_pending_for(&sub.id).await.unwrap().unwrap();
        assert_eq!(reopened.id, event.id);
        assert_eq!(reopened.paid_date, None);
        assert_eq!(f.events.list_for(&sub.id).await.unwrap().len(), 1);

        assert!(ledger.mark_as_paid(&event.id, d(2025, 3, 1)).await.unwrap());
        let stored = f.subs.find_by_id(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.last_payment_date, Some(d(2025, 3, 1)));
        assert_eq!(f.events.pending_count(&sub.id).await, 1);
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let f = fixture();
        let err = f
            .ledger
            .mark_as_paid(&PaymentEventId::new(), d(2025, 3, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentEventNotFound);
    }

    #[tokio::test]
    async fn complete_payment_books_income_once() {
        let f = fixture();
        let payment = Payment::pending(None, 12_000, d(2025, 3, 1)).unwrap();
        f.book.save_payment(&payment).await.unwrap();

        assert!(f
            .ledger
            .complete_payment(&payment.id, d(2025, 3, 2), Some("mp-1".into()))
            .await
            .unwrap());
        assert!(!f
            .ledger
            .complete_payment(&payment.id, d(2025, 3, 3), None)
            .await
            .unwrap());

        assert_eq!(f.book.transaction_count().await, 1);
        let stored = f.book.find_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
    }
}
