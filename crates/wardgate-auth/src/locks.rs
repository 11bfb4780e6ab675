//! Per-user serialisation of session mutations.
//!
//! Login reads the user's active sessions, partitions them and writes
//! back. Two such sequences for the same user must not interleave, or
//! both act on the same snapshot and one login's session goes missing
//! from the other's view. Every mutating path takes the user's lock
//! first.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s sessions.
    pub async fn lock(&self, user_id: Uuid) -> UserLockGuard {
        let mutex = self.locks.entry(user_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        UserLockGuard {
            user_id,
            locks: Arc::clone(&self.locks),
            guard,
        }
    }

    /// Users with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Releases the user's lock on drop, and forgets the user once nobody
/// else holds or awaits it.
pub struct UserLockGuard {
    user_id: Uuid,
    locks: Arc<LockMap>,
    guard: OwnedMutexGuard<()>,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        let ours = OwnedMutexGuard::mutex(&self.guard);
        // Map entry + this guard.
        self.locks.remove_if(&self.user_id, |_, mutex| {
            Arc::ptr_eq(mutex, ours) && Arc::strong_count(mutex) == 2
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn entry_is_dropped_after_release() {
        let locks = UserLocks::new();
        let user = Uuid::new_v4();

        let guard = locks.lock(user).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn same_user_is_serialised() {
        let locks = UserLocks::new();
        let user = Uuid::new_v4();

        let guard = locks.lock(user).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(user).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished(), "second lock must wait");

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4()))
            .await
            .expect("unrelated user must not wait");
        assert_eq!(locks.len(), 2);
    }
}
