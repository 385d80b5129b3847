//! JobScheduler - runs the billing jobs on a fixed interval.
//!
//! ## Tick order
//!
//! 1. Poll pending links against their gateway
//! 2. Expire stale payment links
//! 3. Expire overdue subscriptions
//! 4. Renew auto-renewing subscriptions
//! 5. Generate payment links for due subscriptions (opt-in)
//!
//! ## Graceful Shutdown
//!
//! The scheduler listens on a watch channel and finishes the tick in
//! progress before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::{BillingJobs, JobReport};
use crate::domain::foundation::DomainError;
use crate::ports::Clock;

/// Configuration for the JobScheduler.
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Time between ticks.
    pub interval: Duration,

    /// Create gateway checkouts for due subscriptions on each tick.
    pub generate_payment_links: bool,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            generate_payment_links: false,
        }
    }
}

impl JobSchedulerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_payment_links(mut self, enabled: bool) -> Self {
        self.generate_payment_links = enabled;
        self
    }
}

/// Background loop driving [`BillingJobs`].
pub struct JobScheduler {
    jobs: Arc<BillingJobs>,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(jobs: Arc<BillingJobs>, clock: Arc<dyn Clock>, config: JobSchedulerConfig) -> Self {
        Self {
            jobs,
            clock,
            config,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.config.interval.as_secs(), "Job scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Job scheduler stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Run every job once. A failing job is logged and the rest still run.
    pub async fn tick(&self) -> Vec<JobReport> {
        let now = self.clock.now();
        let today = now.date();

        let mut reports = Vec::new();
        let mut record = |result: Result<JobReport, DomainError>| match result {
            Ok(report) => reports.push(report),
            Err(err) => tracing::error!(error = %err, "Billing job aborted"),
        };

        record(self.jobs.poll_pending_payments().await);
        record(self.jobs.expire_stale_payment_links(now).await);
        record(self.jobs.expire_overdue_subscriptions(today, false).await);
        record(self.jobs.renew_auto_subscriptions(today).await);
        if self.config.generate_payment_links {
            record(self.jobs.generate_payment_links(today, false).await);
        }
        reports
    }
}
