//! Subscription domain module.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate entity
//! - `status` - SubscriptionStatus state machine
//! - `payment_type` - Monthly/annual cadence
//! - `reference` - Human-readable reference ids
//! - `client` - Clients, RUT tax ids and applications
//! - `quote` - Quote calculator pricing monthly/annual pairs

mod aggregate;
mod client;
mod payment_type;
mod quote;
mod reference;
mod status;

pub use aggregate::{Subscription, SubscriptionTerms, DEFAULT_GRACE_PERIOD_DAYS};
pub use client::{Application, Client, Nationality, TaxId};
pub use payment_type::PaymentType;
pub use quote::{Quote, QuoteItem};
pub use reference::{ReferenceId, REFERENCE_ATTEMPTS};
pub use status::SubscriptionStatus;
