//! ForgeApp Billing - Subscription lifecycle and payment reconciliation
//!
//! This crate keeps the ForgeApp back office's subscriptions, their
//! payment-event ledger and gateway checkouts (Mercado Pago, Flow) in
//! agreement, no matter which channel reports a payment first.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
