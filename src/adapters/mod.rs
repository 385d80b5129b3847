//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `clock` - wall and fixed clocks
//! - `gateways` - Mercado Pago, Flow and a scriptable mock
//! - `http` - axum endpoints for gateway callbacks
//! - `memory` - in-memory repositories and the in-process locker
//! - `notifier` - receipt delivery
//! - `postgres` - sqlx repositories and advisory locks
//! - `scheduler` - background job loop

pub mod clock;
pub mod gateways;
pub mod http;
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod scheduler;

pub use clock::{FixedClock, SystemClock};
pub use notifier::LoggingReceiptNotifier;
pub use scheduler::{JobScheduler, JobSchedulerConfig};
