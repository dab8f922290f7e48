//! Transaction ids and visibility snapshots.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction identifier. Ids are allocated monotonically.
pub type TxnId = u64;

/// A point-in-time view of which transactions were in progress.
///
/// A snapshot sees transaction `t` when `t` started before the snapshot was
/// taken and had not been marked in progress at that moment.
#[derive(Clone, Debug)]
pub struct Snapshot {
    xmax: TxnId,
    active: BTreeSet<TxnId>,
}

impl Snapshot {
    /// Returns true if work done by transaction `t` is visible under this
    /// snapshot.
    pub fn sees(&self, t: TxnId) -> bool {
        t < self.xmax && !self.active.contains(&t)
    }

    /// Returns true if transaction `t` was in progress when the snapshot was
    /// taken.
    pub fn is_active(&self, t: TxnId) -> bool {
        self.active.contains(&t)
    }
}

/// Allocates transaction ids and tracks which transactions are in progress.
#[derive(Debug, Default)]
pub struct TxnManager {
    next_id: AtomicU64,
    active: Mutex<BTreeSet<TxnId>>,
}

impl TxnManager {
    /// Creates a new transaction manager.
    pub fn new() -> Self {
        TxnManager {
            next_id: AtomicU64::new(1),
            active: Mutex::new(BTreeSet::new()),
        }
    }

    /// Starts a transaction and returns its id.
    pub fn begin(&self) -> TxnId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.active.lock().insert(id);
        id
    }

    /// Marks a transaction finished, whether committed or aborted.
    pub fn finish(&self, id: TxnId) {
        self.active.lock().remove(&id);
    }

    /// Returns true if the transaction is still in progress.
    pub fn is_in_progress(&self, id: TxnId) -> bool {
        self.active.lock().contains(&id)
    }

    /// Takes a visibility snapshot of the current moment.
    pub fn snapshot(&self) -> Snapshot {
        let active = self.active.lock().clone();
        Snapshot {
            xmax: self.next_id.load(Ordering::SeqCst),
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_monotonic() {
        let mgr = TxnManager::new();
        let a = mgr.begin();
        let b = mgr.begin();
        assert!(b > a);
    }

    #[test]
    fn test_snapshot_hides_active() {
        let mgr = TxnManager::new();
        let committed = mgr.begin();
        mgr.finish(committed);
        let running = mgr.begin();

        let snap = mgr.snapshot();
        assert!(snap.sees(committed));
        assert!(!snap.sees(running));
        assert!(snap.is_active(running));
    }

    #[test]
    fn test_snapshot_hides_future() {
        let mgr = TxnManager::new();
        let snap = mgr.snapshot();
        let later = mgr.begin();
        mgr.finish(later);
        assert!(!snap.sees(later));
    }

    #[test]
    fn test_finish_clears_in_progress() {
        let mgr = TxnManager::new();
        let t = mgr.begin();
        assert!(mgr.is_in_progress(t));
        mgr.finish(t);
        assert!(!mgr.is_in_progress(t));
    }
}
