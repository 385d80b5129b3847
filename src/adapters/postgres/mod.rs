//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresSubscriptionRepository` - subscriptions and reference sequences
//! - `PostgresPaymentEventRepository` - pending-guarded payment events
//! - `PostgresPaymentLinkRepository` - gateway checkouts
//! - `PostgresLedgerRepository` - payments, transactions and receipts
//! - `PgAdvisoryLocker` - transaction-scoped advisory locks on their own pool
//!
//! Schema lives in `migrations/`.

mod advisory_locker;
mod ledger_repository;
mod payment_event_repository;
mod payment_link_repository;
mod subscription_repository;

pub use advisory_locker::PgAdvisoryLocker;
pub use ledger_repository::PostgresLedgerRepository;
pub use payment_event_repository::PostgresPaymentEventRepository;
pub use payment_link_repository::PostgresPaymentLinkRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Connect a pool, applying pending migrations when asked.
pub async fn connect(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
    run_migrations: bool,
) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(|e| DomainError::database(format!("Failed to connect: {}", e)))?;

    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))?;
    }

    tracing::info!(max_connections, run_migrations, "PostgreSQL pool ready");
    Ok(pool)
}

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::database(format!("Failed to {}: {}", action, e))
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

/// Parse a stored enum column.
fn parse_column<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T, DomainError> {
    parse(value).ok_or_else(|| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid {} value: {}", column, value),
        )
    })
}
