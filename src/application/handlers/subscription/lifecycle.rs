//! SubscriptionLifecycle - status changes for subscriptions.
//!
//! Every operation takes the subscription lock, reloads the aggregate, and
//! persists it before releasing. Rejected transitions are reported as
//! `Ok(false)` with a warning; only infrastructure failures are errors.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::application::handlers::ledger::{PaymentLedger, ACTIVATION_NOTE};
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId};
use crate::domain::subscription::Subscription;
use crate::ports::{
    subscription_key, PaymentEventRepository, SubscriptionLocker, SubscriptionRepository,
};

pub struct SubscriptionLifecycle {
    pub(super) subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn PaymentEventRepository>,
    ledger: Arc<PaymentLedger>,
    locker: Arc<dyn SubscriptionLocker>,
}

impl SubscriptionLifecycle {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn PaymentEventRepository>,
        ledger: Arc<PaymentLedger>,
        locker: Arc<dyn SubscriptionLocker>,
    ) -> Self {
        Self {
            subscriptions,
            events,
            ledger,
            locker,
        }
    }

    /// Activate a pending subscription and open its first payment event,
    /// due on the start date.
    pub async fn activate(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        let outcome = subscription.activate();
        if !applied(&subscription, "activate", outcome)? {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        self.ledger
            .insert_pending(
                subscription.id,
                subscription.start_date,
                subscription.price,
                ACTIVATION_NOTE,
            )
            .await?;
        tracing::info!(reference_id = %subscription.reference_id, "Subscription activated");
        Ok(true)
    }

    /// Cancel and drop any pending payment events.
    pub async fn cancel(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        let outcome = subscription.cancel();
        if !applied(&subscription, "cancel", outcome)? {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        let removed = self.events.delete_pending_for(id).await?;
        tracing::info!(
            reference_id = %subscription.reference_id,
            removed_events = removed,
            "Subscription cancelled"
        );
        Ok(true)
    }

    /// Suspend and drop any pending payment events.
    pub async fn deactivate(&self, id: &SubscriptionId) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        let outcome = subscription.deactivate();
        if !applied(&subscription, "deactivate", outcome)? {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        let removed = self.events.delete_pending_for(id).await?;
        tracing::info!(
            reference_id = %subscription.reference_id,
            removed_events = removed,
            "Subscription suspended"
        );
        Ok(true)
    }

    /// Restart billing from `today` and open a payment event due today.
    pub async fn renew(&self, id: &SubscriptionId, today: NaiveDate) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        let outcome = subscription.renew(today);
        if !applied(&subscription, "renew", outcome)? {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        self.ledger
            .insert_pending(subscription.id, today, subscription.price, ACTIVATION_NOTE)
            .await?;
        tracing::info!(
            reference_id = %subscription.reference_id,
            start_date = %today,
            "Subscription renewed"
        );
        Ok(true)
    }

    /// Roll an elapsed auto-renewing period forward. Creates no payment event.
    pub async fn check_and_renew(
        &self,
        id: &SubscriptionId,
        today: NaiveDate,
    ) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        if !subscription.check_and_renew(today) {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        tracing::info!(
            reference_id = %subscription.reference_id,
            current_period_end = %subscription.current_period_end,
            "Subscription period rolled forward"
        );
        Ok(true)
    }

    /// Expire an active subscription whose grace period has passed.
    ///
    /// Pending events are kept so a late payment can still reactivate it.
    pub async fn expire_if_overdue(
        &self,
        id: &SubscriptionId,
        today: NaiveDate,
        grace_period_days: u32,
    ) -> Result<bool, DomainError> {
        let _guard = self.locker.lock(&subscription_key(id)).await?;
        let mut subscription = self.load(id).await?;
        if !subscription.is_overdue(today, grace_period_days) {
            return Ok(false);
        }
        let outcome = subscription.expire();
        if !applied(&subscription, "expire", outcome)? {
            return Ok(false);
        }
        self.subscriptions.update(&subscription).await?;
        tracing::info!(
            reference_id = %subscription.reference_id,
            grace_period_end = %subscription.grace_period_end(grace_period_days),
            "Subscription expired"
        );
        Ok(true)
    }

    pub(super) async fn load(&self, id: &SubscriptionId) -> Result<Subscription, DomainError> {
        self.subscriptions.find_by_id(id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", id),
            )
        })
    }
}

/// Turn a rejected transition into `Ok(false)` with a warning.
fn applied(
    subscription: &Subscription,
    operation: &str,
    outcome: Result<(), DomainError>,
) -> Result<bool, DomainError> {
    match outcome {
        Ok(()) => Ok(true),
        Err(err) if err.is_invalid_transition() => {
            tracing::warn!(
                reference_id = %subscription.reference_id,
                status = subscription.status.as_str(),
                operation,
                "Transition rejected"
            );
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
