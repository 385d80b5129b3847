//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Subscription aggregates
//! - `PaymentEventRepository` - Payment events with atomic pending/paid guards
//! - `PaymentLinkRepository` - Gateway checkouts
//! - `LedgerRepository` - Payments, transactions and receipts
//! - `SubscriptionLocker` - Per-subscription critical sections
//!
//! ## Integration Ports
//!
//! - `PaymentGateway` - Mercado Pago / Flow checkout and status queries
//! - `ReceiptNotifier` - Receipt rendering and delivery
//! - `Clock` - Time source

mod clock;
mod ledger_repository;
mod payment_event_repository;
mod payment_gateway;
mod payment_link_repository;
mod receipt_notifier;
mod subscription_locker;
mod subscription_repository;

pub use clock::Clock;
pub use ledger_repository::LedgerRepository;
pub use payment_event_repository::PaymentEventRepository;
pub use payment_gateway::{
    GatewayError, GatewayErrorCode, GatewayPaymentStatus, PaymentGateway, PaymentGateways,
    PaymentIntent, PaymentIntentRequest,
};
pub use payment_link_repository::PaymentLinkRepository;
pub use receipt_notifier::{NotifyError, ReceiptNotifier};
pub use subscription_locker::{payment_link_key, subscription_key, LockGuard, SubscriptionLocker};
pub use subscription_repository::SubscriptionRepository;
