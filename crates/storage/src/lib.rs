//! Vireo Storage - base tables, undo journal, transactions and view locks.
//!
//! This crate provides the storage substrate the maintenance engine runs on:
//!
//! - `TableStore` / `TableSet`: in-memory base-table storage
//! - `Journal`: level-tagged undo log for base-table changes
//! - `TxnManager` / `Snapshot`: transaction ids and visibility snapshots
//! - `ViewLockManager`: session-scoped exclusive per-view maintenance locks

mod journal;
mod lock;
mod store;
mod txn;

pub use journal::{Journal, JournalEntry, RowChange};
pub use lock::{SessionId, ViewLockManager};
pub use store::{TableSet, TableStore};
pub use txn::{Snapshot, TxnId, TxnManager};
