//! The shared database instance.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use vireo_core::{Result, TableDef};
use vireo_engine::ViewRegistry;
use vireo_storage::{TableSet, TxnManager, ViewLockManager};

use crate::session::Session;

/// An embedded database with incrementally maintained views.
///
/// The database itself is shared; all reads and writes go through
/// per-connection [`Session`]s. Lock order is always base tables before the
/// view catalog.
pub struct Database {
    pub(crate) tables: RwLock<TableSet>,
    pub(crate) views: RwLock<ViewRegistry>,
    pub(crate) txns: TxnManager,
    pub(crate) locks: ViewLockManager,
    next_session: AtomicU64,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Arc<Self> {
        Arc::new(Database {
            tables: RwLock::new(TableSet::new()),
            views: RwLock::new(ViewRegistry::new()),
            txns: TxnManager::new(),
            locks: ViewLockManager::new(),
            next_session: AtomicU64::new(1),
        })
    }

    /// Creates a base table.
    pub fn create_table(&self, def: TableDef) -> Result<()> {
        debug!(table = def.name(), "creating table");
        self.tables.write().create_table(def)
    }

    /// Opens a session against this database.
    pub fn connect(self: &Arc<Self>) -> Session {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        Session::new(Arc::clone(self), id)
    }
}
