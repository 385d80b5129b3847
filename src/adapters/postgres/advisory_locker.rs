//! Subscription locks backed by PostgreSQL advisory locks.
//!
//! Each lock opens a transaction and takes `pg_advisory_xact_lock` on the
//! hashed key. The transaction lives inside the returned guard; dropping
//! the guard rolls it back, which releases the lock. Works across
//! processes sharing one database.
//!
//! The locker owns its pool. Waiters park on lock connections, never on
//! the connections the repositories need to finish the holder's work.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::db_error;
use crate::domain::foundation::DomainError;
use crate::ports::{LockGuard, SubscriptionLocker};

#[derive(Clone)]
pub struct PgAdvisoryLocker {
    pool: PgPool,
}

impl PgAdvisoryLocker {
    /// Open a dedicated pool of lock connections.
    ///
    /// `max_connections` bounds how many callers can hold or wait on a lock
    /// at once; the rest queue on the pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DomainError> {
        let pool = super::connect(url, max_connections, acquire_timeout, false).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SubscriptionLocker for PgAdvisoryLocker {
    async fn lock(&self, key: &str) -> Result<LockGuard, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error("open lock transaction"))?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(db_error("acquire advisory lock"))?;
        Ok(LockGuard::new(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    #[ignore = "Requires a PostgreSQL database at DATABASE_URL"]
    async fn contended_key_does_not_starve_work_pool() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let timeout = Duration::from_secs(5);
        let work = super::super::connect(&url, 1, timeout, false).await.unwrap();
        let locker = Arc::new(PgAdvisoryLocker::connect(&url, 2, timeout).await.unwrap());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let locker = locker.clone();
                let work = work.clone();
                tokio::spawn(async move {
                    let _guard = locker.lock("subscription:contended").await?;
                    sqlx::query("SELECT pg_sleep(0.05)")
                        .execute(&work)
                        .await
                        .map_err(db_error("run guarded work"))?;
                    Ok::<_, DomainError>(())
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
