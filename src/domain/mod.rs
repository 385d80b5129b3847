//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, date math, errors)
//! - `subscription` - Subscription aggregate, status machine and clients
//! - `ledger` - Payment events, side-ledger payments/transactions, receipts
//! - `reconciliation` - Gateway status mapping, payment links, webhook checks

pub mod foundation;
pub mod ledger;
pub mod reconciliation;
pub mod subscription;
