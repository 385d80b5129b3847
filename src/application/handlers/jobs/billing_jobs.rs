//! BillingJobs - periodic batch work.
//!
//! Each item is processed on its own; a failure is counted and logged and
//! the batch moves on.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::application::handlers::reconciliation::PaymentReconciler;
use crate::application::handlers::subscription::SubscriptionLifecycle;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::reconciliation::PaymentLinkStatus;
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{Clock, PaymentEventRepository, PaymentLinkRepository, SubscriptionRepository};

/// Summary of one job run.
///
/// In a dry run `changed` counts what would have changed; nothing is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub examined: usize,
    pub changed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,

    /// References of the items that changed (or would have).
    pub references: Vec<String>,
}

impl JobReport {
    fn new(job: &'static str, dry_run: bool) -> Self {
        Self {
            job,
            dry_run,
            ..Self::default()
        }
    }

    fn changed(&mut self, reference: impl Into<String>) {
        self.changed += 1;
        self.references.push(reference.into());
    }

    fn failed(&mut self, reference: &str, err: &dyn std::fmt::Display) {
        self.failed += 1;
        tracing::error!(job = self.job, reference, error = %err, "Job item failed");
    }

    fn finish(self) -> Self {
        tracing::info!(
            job = self.job,
            examined = self.examined,
            changed = self.changed,
            skipped = self.skipped,
            failed = self.failed,
            dry_run = self.dry_run,
            "Job finished"
        );
        self
    }
}

pub struct BillingJobs {
    subscriptions: Arc<dyn SubscriptionRepository>,
    events: Arc<dyn PaymentEventRepository>,
    links: Arc<dyn PaymentLinkRepository>,
    lifecycle: Arc<SubscriptionLifecycle>,
    reconciler: Arc<PaymentReconciler>,
    clock: Arc<dyn Clock>,
    grace_period_days: u32,
}

impl BillingJobs {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        events: Arc<dyn PaymentEventRepository>,
        links: Arc<dyn PaymentLinkRepository>,
        lifecycle: Arc<SubscriptionLifecycle>,
        reconciler: Arc<PaymentReconciler>,
        clock: Arc<dyn Clock>,
        grace_period_days: u32,
    ) -> Self {
        Self {
            subscriptions,
            events,
            links,
            lifecycle,
            reconciler,
            clock,
            grace_period_days,
        }
    }

    /// Expire active subscriptions past their grace period.
    pub async fn expire_overdue_subscriptions(
        &self,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<JobReport, DomainError> {
        let mut report = JobReport::new("expire_overdue_subscriptions", dry_run);
        for subscription in self.active().await? {
            report.examined += 1;
            if !subscription.is_overdue(today, self.grace_period_days) {
                report.skipped += 1;
                continue;
            }
            let reference = subscription.reference_id.to_string();
            if dry_run {
                report.changed(reference);
                continue;
            }
            match self
                .lifecycle
                .expire_if_overdue(&subscription.id, today, self.grace_period_days)
                .await
            {
                Ok(true) => report.changed(reference),
                Ok(false) => report.skipped += 1,
                Err(err) => report.failed(&reference, &err),
            }
        }
        Ok(report.finish())
    }

    /// Roll elapsed periods of auto-renewing subscriptions forward.
    pub async fn renew_auto_subscriptions(&self, today: NaiveDate) -> Result<JobReport, DomainError> {
        let mut report = JobReport::new("renew_auto_subscriptions", false);
        for subscription in self.active().await? {
            report.examined += 1;
            if !subscription.auto_renewal {
                report.skipped += 1;
                continue;
            }
            let reference = subscription.reference_id.to_string();
            match self.lifecycle.check_and_renew(&subscription.id, today).await {
                Ok(true) => report.changed(reference),
                Ok(false) => report.skipped += 1,
                Err(err) => report.failed(&reference, &err),
            }
        }
        Ok(report.finish())
    }

    /// Re-query the gateway for every pending payment link.
    pub async fn poll_pending_payments(&self) -> Result<JobReport, DomainError> {
        let mut report = JobReport::new("poll_pending_payments", false);
        for link in self.links.find_pending().await? {
            report.examined += 1;
            match self.reconciler.refresh_payment_link(&link.reference_id).await {
                Ok(Some(outcome)) if outcome.link.status != PaymentLinkStatus::Pending => {
                    report.changed(link.reference_id)
                }
                Ok(_) => report.skipped += 1,
                Err(err) => report.failed(&link.reference_id, &err),
            }
        }
        Ok(report.finish())
    }

    /// Issue a checkout for every due subscription that has a pending
    /// event but no open link.
    pub async fn generate_payment_links(
        &self,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<JobReport, DomainError> {
        let mut report = JobReport::new("generate_payment_links", dry_run);
        let now = self.clock.now();
        for subscription in self.subscriptions_needing_payment(today).await? {
            report.examined += 1;
            let reference = subscription.reference_id.to_string();
            let needs_link = match self.needs_link(&subscription, now).await {
                Ok(needs) => needs,
                Err(err) => {
                    report.failed(&reference, &err);
                    continue;
                }
            };
            if !needs_link {
                report.skipped += 1;
                continue;
            }
            if dry_run {
                report.changed(reference);
                continue;
            }
            match self.reconciler.create_payment_link(&subscription.id, None).await {
                Ok(link) => report.changed(link.reference_id),
                Err(err) => report.failed(&reference, &err),
            }
        }
        Ok(report.finish())
    }

    /// Mark pending links past their expiry as expired, unless the gateway
    /// reports them paid.
    pub async fn expire_stale_payment_links(&self, now: Timestamp) -> Result<JobReport, DomainError> {
        let mut report = JobReport::new("expire_stale_payment_links", false);
        for link in self.links.find_pending().await? {
            report.examined += 1;
            if link.is_open(now) {
                report.skipped += 1;
                continue;
            }
            match self.reconciler.expire_link_if_stale(&link.reference_id, now).await {
                Ok(true) => report.changed(link.reference_id),
                Ok(false) => report.skipped += 1,
                Err(err) => report.failed(&link.reference_id, &err),
            }
        }
        Ok(report.finish())
    }

    /// Active subscriptions with a charge due on or before `today`.
    pub async fn subscriptions_needing_payment(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .active()
            .await?
            .into_iter()
            .filter(|s| s.is_payment_due(today))
            .collect())
    }

    async fn needs_link(&self, subscription: &Subscription, now: Timestamp) -> Result<bool, DomainError> {
        let Some(event) = self.events.find_pending_for(&subscription.id).await? else {
            return Ok(false);
        };
        Ok(self.links.find_open_for_event(&event.id, now).await?.is_none())
    }

    async fn active(&self) -> Result<Vec<Subscription>, DomainError> {
        self.subscriptions
            .find_by_status(SubscriptionStatus::Active)
            .await
    }
}
