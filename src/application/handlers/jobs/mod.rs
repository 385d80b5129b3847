//! Scheduled batch jobs.

mod billing_jobs;

pub use billing_jobs::{BillingJobs, JobReport};
