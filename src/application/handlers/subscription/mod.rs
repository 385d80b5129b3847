//! Subscription handlers.
//!
//! ## Commands
//! - Creating subscriptions (single or from a quote)
//! - Activating, cancelling, suspending and renewing
//! - Auto-renewal rollover and overdue expiry (used by jobs)

mod create_subscription;
mod lifecycle;

pub use create_subscription::{CreateFromQuoteCommand, CreateFromQuoteResult};
pub use lifecycle::SubscriptionLifecycle;
