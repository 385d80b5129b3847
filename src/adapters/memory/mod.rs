//! In-memory adapters for tests and single-process development.

mod ledger_repository;
mod locker;
mod payment_event_repository;
mod payment_link_repository;
mod subscription_repository;

pub use ledger_repository::InMemoryLedgerRepository;
pub use locker::InProcessSubscriptionLocker;
pub use payment_event_repository::InMemoryPaymentEventRepository;
pub use payment_link_repository::InMemoryPaymentLinkRepository;
pub use subscription_repository::InMemorySubscriptionRepository;
