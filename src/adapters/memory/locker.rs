//! In-process keyed mutex locker.
//!
//! One `tokio::sync::Mutex` per key, created on first use. Entries whose
//! mutex nobody holds are pruned on each acquisition.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{LockGuard, SubscriptionLocker};

#[derive(Debug, Clone, Default)]
pub struct InProcessSubscriptionLocker {
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InProcessSubscriptionLocker {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Result<Arc<Mutex<()>>, DomainError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "lock table poisoned"))?;
        // Only the table holds an unused mutex.
        locks.retain(|k, m| k == key || Arc::strong_count(m) > 1);
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SubscriptionLocker for InProcessSubscriptionLocker {
    async fn lock(&self, key: &str) -> Result<LockGuard, DomainError> {
        let mutex = self.entry(key)?;
        let guard = mutex.lock_owned().await;
        Ok(LockGuard::new(guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locker = InProcessSubscriptionLocker::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locker = locker.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = locker.lock("subscription:a").await.unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locker = InProcessSubscriptionLocker::new();
        let _a = locker.lock("subscription:a").await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(50), locker.lock("subscription:b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locker = InProcessSubscriptionLocker::new();
        drop(locker.lock("subscription:a").await.unwrap());
        drop(locker.lock("subscription:b").await.unwrap());
        assert_eq!(locker.tracked_keys(), 1);
    }
}
