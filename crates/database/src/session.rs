//! Per-connection sessions: statements, transactions and view commands.

use std::sync::Arc;
use tracing::debug;
use vireo_core::{MaintenanceError, Result, Row, Value};
use vireo_engine::{
    Delta, EpisodeCtx, GroupRescan, MaintenanceContext, MaintenanceCoordinator, MergeEngine,
    Predicate, QueryNode, ResultDelta, TransitionLog, ViewDescriptor, ViewShape, ViewUndoLog,
};
use vireo_storage::{Journal, SessionId, Snapshot, TableSet, TxnId};

use crate::database::Database;
use crate::eligibility::check_eligibility;

struct Savepoint {
    name: String,
    level: u32,
}

struct TxnState {
    id: TxnId,
    snapshot: Snapshot,
    level: u32,
    savepoints: Vec<Savepoint>,
    journal: Journal,
    undo: ViewUndoLog,
    ctx: MaintenanceContext,
}

/// A connection to a [`Database`].
///
/// Statements run in the current transaction, or in an implicit
/// single-statement transaction when none is open. A statement that fails is
/// rolled back on its own; the surrounding transaction stays usable.
pub struct Session {
    db: Arc<Database>,
    id: SessionId,
    txn: Option<TxnState>,
}

impl Session {
    pub(crate) fn new(db: Arc<Database>, id: SessionId) -> Self {
        Session { db, id, txn: None }
    }

    /// Returns the session id.
    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Starts a transaction.
    pub fn begin(&mut self) -> Result<()> {
        if self.txn.is_some() {
            return Err(MaintenanceError::TransactionActive);
        }
        let id = self.db.txns.begin();
        // The visibility snapshot for the whole transaction, including the
        // concurrent-maintainer check, is taken here.
        let snapshot = self.db.txns.snapshot();
        self.txn = Some(TxnState {
            id,
            snapshot,
            level: 1,
            savepoints: Vec::new(),
            journal: Journal::new(),
            undo: ViewUndoLog::new(),
            ctx: MaintenanceContext::new(),
        });
        debug!(session = self.id, txn = id, "transaction started");
        Ok(())
    }

    /// Commits the current transaction.
    pub fn commit(&mut self) -> Result<()> {
        let mut txn = self.txn.take().ok_or(MaintenanceError::TransactionInactive)?;
        txn.journal.clear();
        txn.undo.clear();
        txn.ctx.clear();
        self.db.locks.release_all(self.id);
        self.db.txns.finish(txn.id);
        debug!(session = self.id, txn = txn.id, "transaction committed");
        Ok(())
    }

    /// Rolls back the current transaction, undoing base-table changes and
    /// restoring every maintained view.
    pub fn rollback(&mut self) -> Result<()> {
        let mut txn = self.txn.take().ok_or(MaintenanceError::TransactionInactive)?;
        let undone = {
            let mut tables = self.db.tables.write();
            txn.journal.rollback_to_mark(0, &mut tables)
        };
        {
            let mut views = self.db.views.write();
            txn.undo.rollback_to_mark(0, &mut views);
        }
        txn.ctx.at_abort(1);
        self.db.locks.release_all(self.id);
        self.db.txns.finish(txn.id);
        debug!(session = self.id, txn = txn.id, "transaction rolled back");
        undone
    }

    /// Creates a savepoint.
    pub fn savepoint(&mut self, name: impl Into<String>) -> Result<()> {
        let txn = self.txn.as_mut().ok_or(MaintenanceError::TransactionInactive)?;
        txn.level += 1;
        txn.savepoints.push(Savepoint {
            name: name.into(),
            level: txn.level,
        });
        Ok(())
    }

    /// Rolls back to a savepoint, keeping the savepoint itself.
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let txn = self.txn.as_mut().ok_or(MaintenanceError::TransactionInactive)?;
        let idx = txn
            .savepoints
            .iter()
            .rposition(|s| s.name == name)
            .ok_or_else(|| MaintenanceError::no_such_savepoint(name))?;
        let level = txn.savepoints[idx].level;

        {
            let mut tables = self.db.tables.write();
            txn.journal.rollback_level(level, &mut tables)?;
        }
        {
            let mut views = self.db.views.write();
            txn.undo.rollback_level(level, &mut views);
        }
        txn.ctx.at_abort(level);
        txn.savepoints.truncate(idx + 1);
        txn.level = level;
        Ok(())
    }

    /// Releases a savepoint, merging its changes into the enclosing scope.
    pub fn release_savepoint(&mut self, name: &str) -> Result<()> {
        let txn = self.txn.as_mut().ok_or(MaintenanceError::TransactionInactive)?;
        let idx = txn
            .savepoints
            .iter()
            .rposition(|s| s.name == name)
            .ok_or_else(|| MaintenanceError::no_such_savepoint(name))?;
        let level = txn.savepoints[idx].level;
        // Changes made under the released savepoint now belong to the
        // enclosing scope; a later savepoint reusing the level must not
        // roll them back.
        txn.journal.release_level(level);
        txn.undo.release_level(level);
        txn.savepoints.truncate(idx);
        txn.level = level - 1;
        Ok(())
    }

    /// Inserts a row into a base table, maintaining dependent views.
    pub fn insert(&mut self, table: &str, values: Vec<Value>) -> Result<()> {
        let table = table.to_string();
        self.exec(move |tables, journal, level| {
            let row = Row::create(values);
            tables.table_mut(&table)?.insert(row.clone())?;
            journal.record_insert(level, &table, row.clone());
            let mut log = TransitionLog::new();
            log.table_mut(&table).record_insert(row);
            Ok((log, 1))
        })
        .map(|_| ())
    }

    /// Deletes every row matching the predicate, maintaining dependent
    /// views. Returns the number of rows deleted.
    pub fn delete_where(&mut self, table: &str, predicate: &Predicate) -> Result<usize> {
        let table = table.to_string();
        let predicate = predicate.clone();
        self.exec(move |tables, journal, level| {
            let store = tables.table_mut(&table)?;
            let victims: Vec<Row> = store
                .rows()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect();
            let mut log = TransitionLog::new();
            for row in &victims {
                store.remove(row.id);
                journal.record_delete(level, &table, row.clone());
                log.table_mut(&table).record_delete(row.clone());
            }
            let n = victims.len();
            Ok((log, n))
        })
    }

    /// Updates every row matching the predicate by applying the column
    /// assignments. Returns the number of rows updated.
    pub fn update_where(
        &mut self,
        table: &str,
        predicate: &Predicate,
        assignments: &[(usize, Value)],
    ) -> Result<usize> {
        let table = table.to_string();
        let predicate = predicate.clone();
        let assignments = assignments.to_vec();
        self.exec(move |tables, journal, level| {
            let store = tables.table_mut(&table)?;
            let arity = store.def().column_count();
            for &(column, _) in &assignments {
                if column >= arity {
                    return Err(MaintenanceError::invalid_schema(format!(
                        "column index {column} out of range for table \"{table}\""
                    )));
                }
            }
            let victims: Vec<Row> = store
                .rows()
                .filter(|r| predicate.matches(r))
                .cloned()
                .collect();
            let mut log = TransitionLog::new();
            for old in &victims {
                let mut new = old.clone();
                for (column, value) in &assignments {
                    new.values[*column] = value.clone();
                }
                store.insert(new.clone())?;
                journal.record_update(level, &table, old.clone(), new.clone());
                log.table_mut(&table).record_update(old.clone(), new);
            }
            let n = victims.len();
            Ok((log, n))
        })
    }

    /// Creates a view. With `with_data` the view is populated immediately;
    /// without it the view stays unpopulated until refreshed.
    pub fn create_view(&mut self, name: &str, query: QueryNode, with_data: bool) -> Result<()> {
        check_eligibility(&query)?;
        {
            let tables = self.db.tables.read();
            for table in query.tables() {
                tables.table(&table)?;
            }
        }
        {
            let mut views = self.db.views.write();
            views.create(ViewDescriptor::new(name, query))?;
        }
        if !with_data {
            return Ok(());
        }

        let implicit = self.txn.is_none();
        if implicit {
            self.begin()?;
        }
        let res = self
            .db
            .locks
            .try_acquire(name, self.id)
            .and_then(|()| self.refresh_in_txn(name, true));
        if res.is_err() {
            // The catalog entry is not transactional; take it back out.
            let _ = self.db.views.write().drop_view(name);
        }
        if implicit {
            if res.is_ok() {
                self.commit()?;
            } else {
                let _ = self.rollback();
            }
        }
        res
    }

    /// Drops a view.
    pub fn drop_view(&mut self, name: &str) -> Result<()> {
        self.db.views.write().drop_view(name)
    }

    /// Rebuilds a view from its defining query, or empties it when
    /// `with_data` is false. Waits for any concurrent maintainer to finish.
    pub fn refresh_view(&mut self, name: &str, with_data: bool) -> Result<()> {
        {
            let views = self.db.views.read();
            views.get(name)?;
        }
        let implicit = self.txn.is_none();
        if implicit {
            self.begin()?;
        }
        // Block here while holding no guards so the current holder can
        // finish its transaction.
        self.db.locks.acquire_blocking(name, self.id);
        let res = self.refresh_in_txn(name, with_data);
        if implicit {
            if res.is_ok() {
                self.commit()?;
            } else {
                let _ = self.rollback();
            }
        }
        res
    }

    /// Returns a view's visible rows, sorted by value.
    pub fn query_view(&self, name: &str) -> Result<Vec<Row>> {
        let views = self.db.views.read();
        let entry = views.get(name)?;
        if !entry.state.populated() {
            return Err(MaintenanceError::view_not_populated(name));
        }
        Ok(entry.state.visible_rows(&entry.descriptor))
    }

    /// Returns a base table's rows in id order.
    pub fn query_table(&self, name: &str) -> Result<Vec<Row>> {
        let tables = self.db.tables.read();
        Ok(tables.table(name)?.rows().cloned().collect())
    }

    /// Writes a row directly into a view's contents.
    ///
    /// View contents belong to the maintenance engine; this is rejected
    /// unless the engine has suppressed the guard for the view, which never
    /// holds for user statements.
    pub fn insert_into_view(&mut self, view: &str, values: Vec<Value>) -> Result<()> {
        let suppressed = self
            .txn
            .as_ref()
            .map(|t| t.ctx.is_suppressed(view))
            .unwrap_or(false);
        if !suppressed {
            return Err(MaintenanceError::direct_write_rejected(view));
        }

        let mut views = self.db.views.write();
        let (descriptor, state) = views.descriptor_and_state_mut(view)?;
        if descriptor.shape() != ViewShape::Plain {
            return Err(MaintenanceError::ineligible_query(
                "direct writes are only possible for plain views",
            ));
        }
        let delta = ResultDelta::Rows(vec![Delta::insert(Row::detached(values))]);
        MergeEngine::apply(descriptor, state, &delta, &RejectRescan)
    }

    fn exec<F>(&mut self, apply: F) -> Result<usize>
    where
        F: FnOnce(&mut TableSet, &mut Journal, u32) -> Result<(TransitionLog, usize)>,
    {
        let implicit = self.txn.is_none();
        if implicit {
            self.begin()?;
        }
        let res = self.exec_in_txn(apply);
        if implicit {
            if res.is_ok() {
                self.commit()?;
            } else {
                let _ = self.rollback();
            }
        }
        res
    }

    fn exec_in_txn<F>(&mut self, apply: F) -> Result<usize>
    where
        F: FnOnce(&mut TableSet, &mut Journal, u32) -> Result<(TransitionLog, usize)>,
    {
        let txn = self
            .txn
            .as_mut()
            .ok_or(MaintenanceError::TransactionInactive)?;
        let mut tables = self.db.tables.write();
        let journal_mark = txn.journal.mark();
        let undo_mark = txn.undo.mark();

        let (log, n) = match apply(&mut tables, &mut txn.journal, txn.level) {
            Ok(v) => v,
            Err(e) => {
                txn.journal.rollback_to_mark(journal_mark, &mut tables)?;
                return Err(e);
            }
        };
        if log.is_empty() {
            return Ok(n);
        }

        let mut views = self.db.views.write();
        let coordinator = MaintenanceCoordinator::new(&self.db.locks);
        let mut ep = EpisodeCtx {
            session: self.id,
            txn: txn.id,
            level: txn.level,
            snapshot: &txn.snapshot,
            ctx: &mut txn.ctx,
            undo: &mut txn.undo,
        };
        match coordinator.maintain_incremental(&mut views, &tables, &log, &mut ep) {
            Ok(()) => Ok(n),
            Err(e) => {
                txn.undo.rollback_to_mark(undo_mark, &mut views);
                txn.journal.rollback_to_mark(journal_mark, &mut tables)?;
                txn.ctx.at_abort(txn.level);
                Err(e)
            }
        }
    }

    fn refresh_in_txn(&mut self, name: &str, with_data: bool) -> Result<()> {
        let txn = self
            .txn
            .as_mut()
            .ok_or(MaintenanceError::TransactionInactive)?;
        let tables = self.db.tables.read();
        let mut views = self.db.views.write();
        let undo_mark = txn.undo.mark();
        let coordinator = MaintenanceCoordinator::new(&self.db.locks);
        let mut ep = EpisodeCtx {
            session: self.id,
            txn: txn.id,
            level: txn.level,
            snapshot: &txn.snapshot,
            ctx: &mut txn.ctx,
            undo: &mut txn.undo,
        };
        match coordinator.refresh(&mut views, &tables, name, with_data, &mut ep) {
            Ok(()) => Ok(()),
            Err(e) => {
                txn.undo.rollback_to_mark(undo_mark, &mut views);
                txn.ctx.at_abort(txn.level);
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.txn.is_some() {
            let _ = self.rollback();
        }
    }
}

struct RejectRescan;

impl GroupRescan for RejectRescan {
    fn rescan(&self, d: &ViewDescriptor, _: &[Value], _: usize) -> Result<Vec<Value>> {
        Err(MaintenanceError::state_corruption(
            d.name(),
            "group rescan is not available for direct writes",
        ))
    }
}
