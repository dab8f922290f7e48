//! Session-scoped exclusive view maintenance locks.
//!
//! Each view has one exclusive lock, owned by a session rather than a single
//! statement so it stays held until the transaction ends. Incremental
//! maintenance uses `try_acquire` and fails fast when the lock is taken;
//! full refresh uses `acquire_blocking` and waits for the holder to finish.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use tracing::debug;
use vireo_core::{MaintenanceError, Result};

/// Session identifier used as the lock owner.
pub type SessionId = u64;

#[derive(Debug, Default)]
struct LockTable {
    /// View name to holding session.
    holders: BTreeMap<String, SessionId>,
}

/// Manages the per-view maintenance locks.
#[derive(Debug, Default)]
pub struct ViewLockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl ViewLockManager {
    /// Creates a new lock manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock on `view` for `session` without waiting.
    ///
    /// Re-acquiring a lock the session already holds succeeds.
    pub fn try_acquire(&self, view: &str, session: SessionId) -> Result<()> {
        let mut table = self.table.lock();
        match table.holders.get(view) {
            Some(&holder) if holder != session => {
                debug!(view, session, holder, "view lock busy");
                Err(MaintenanceError::lock_unavailable(view))
            }
            _ => {
                table.holders.insert(view.to_string(), session);
                Ok(())
            }
        }
    }

    /// Acquires the lock on `view` for `session`, waiting until the current
    /// holder releases it.
    ///
    /// The caller must not hold any table or registry guards while waiting.
    pub fn acquire_blocking(&self, view: &str, session: SessionId) {
        let mut table = self.table.lock();
        loop {
            match table.holders.get(view) {
                Some(&holder) if holder != session => {
                    debug!(view, session, holder, "waiting for view lock");
                    self.released.wait(&mut table);
                }
                _ => {
                    table.holders.insert(view.to_string(), session);
                    return;
                }
            }
        }
    }

    /// Releases every lock held by `session` and wakes any waiters.
    pub fn release_all(&self, session: SessionId) {
        let mut table = self.table.lock();
        let before = table.holders.len();
        table.holders.retain(|_, holder| *holder != session);
        if table.holders.len() != before {
            self.released.notify_all();
        }
    }

    /// Returns true if `session` holds the lock on `view`.
    pub fn holds(&self, view: &str, session: SessionId) -> bool {
        self.table.lock().holders.get(view) == Some(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_acquire_and_reacquire() {
        let locks = ViewLockManager::new();
        locks.try_acquire("v", 1).unwrap();
        locks.try_acquire("v", 1).unwrap();
        assert!(locks.holds("v", 1));
    }

    #[test]
    fn test_try_acquire_fails_fast() {
        let locks = ViewLockManager::new();
        locks.try_acquire("v", 1).unwrap();
        let err = locks.try_acquire("v", 2).unwrap_err();
        assert!(matches!(err, MaintenanceError::LockUnavailable { .. }));
    }

    #[test]
    fn test_distinct_views_independent() {
        let locks = ViewLockManager::new();
        locks.try_acquire("a", 1).unwrap();
        locks.try_acquire("b", 2).unwrap();
        assert!(locks.holds("a", 1));
        assert!(locks.holds("b", 2));
    }

    #[test]
    fn test_release_all_frees_locks() {
        let locks = ViewLockManager::new();
        locks.try_acquire("a", 1).unwrap();
        locks.try_acquire("b", 1).unwrap();
        locks.release_all(1);
        assert!(!locks.holds("a", 1));
        locks.try_acquire("a", 2).unwrap();
    }

    #[test]
    fn test_blocking_acquire_waits_for_release() {
        let locks = Arc::new(ViewLockManager::new());
        locks.try_acquire("v", 1).unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                locks.acquire_blocking("v", 2);
                assert!(locks.holds("v", 2));
            })
        };

        thread::sleep(std::time::Duration::from_millis(20));
        locks.release_all(1);
        waiter.join().unwrap();
    }
}
