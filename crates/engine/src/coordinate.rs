//! Maintenance coordination.
//!
//! After a statement writes base tables, the coordinator runs one
//! maintenance episode per dependent view: take the view's session lock,
//! check for a concurrent maintainer, snapshot the state for undo, stamp the
//! view with the maintaining transaction, then propagate and merge. Full
//! refresh reuses the same merge path with a delta built from a fresh
//! evaluation of the defining query.

use crate::context::MaintenanceContext;
use crate::merge::MergeEngine;
use crate::propagate::Propagator;
use crate::registry::ViewRegistry;
use crate::transition::TransitionLog;
use crate::view::ViewState;
use std::collections::BTreeSet;
use tracing::debug;
use vireo_core::{MaintenanceError, Result};
use vireo_storage::{SessionId, Snapshot, TableSet, TxnId, ViewLockManager};

/// Pre-maintenance snapshots of view state, used to undo view changes when
/// a statement or subtransaction rolls back.
#[derive(Debug, Default)]
pub struct ViewUndoLog {
    entries: Vec<UndoEntry>,
}

#[derive(Debug)]
struct UndoEntry {
    view: String,
    level: u32,
    state: ViewState,
}

impl ViewUndoLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots a view's state before a maintenance episode touches it.
    pub fn record(&mut self, view: &str, level: u32, state: &ViewState) {
        self.entries.push(UndoEntry {
            view: view.to_string(),
            level,
            state: state.clone(),
        });
    }

    /// Returns a positional mark for statement-level rollback.
    #[inline]
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Restores every snapshot taken after `mark`, newest first.
    pub fn rollback_to_mark(&mut self, mark: usize, registry: &mut ViewRegistry) {
        while self.entries.len() > mark {
            if let Some(entry) = self.entries.pop() {
                registry.restore_state(&entry.view, entry.state);
            }
        }
    }

    /// Restores every snapshot taken at or above `level`, newest first.
    pub fn rollback_level(&mut self, level: u32, registry: &mut ViewRegistry) {
        while self.entries.last().is_some_and(|e| e.level >= level) {
            if let Some(entry) = self.entries.pop() {
                registry.restore_state(&entry.view, entry.state);
            }
        }
    }

    /// Re-tags snapshots at or above `level` to the enclosing level. Called
    /// when a savepoint is released, so its view changes roll back with the
    /// outer scope rather than with a later savepoint reusing the level.
    pub fn release_level(&mut self, level: u32) {
        debug_assert!(level > 1);
        for entry in self.entries.iter_mut().rev() {
            if entry.level < level {
                break;
            }
            entry.level = level - 1;
        }
    }

    /// Discards all snapshots. Used at commit.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Runs maintenance episodes against the view catalog.
pub struct MaintenanceCoordinator<'a> {
    locks: &'a ViewLockManager,
}

/// Everything a maintenance episode needs from the owning transaction,
/// including the visibility snapshot it took at `begin`.
pub struct EpisodeCtx<'a> {
    pub session: SessionId,
    pub txn: TxnId,
    pub level: u32,
    pub snapshot: &'a Snapshot,
    pub ctx: &'a mut MaintenanceContext,
    pub undo: &'a mut ViewUndoLog,
}

impl<'a> MaintenanceCoordinator<'a> {
    /// Creates a coordinator.
    pub fn new(locks: &'a ViewLockManager) -> Self {
        MaintenanceCoordinator { locks }
    }

    /// Incrementally maintains every view affected by the statement's
    /// transition log. Fails fast if another session holds a view's lock.
    pub fn maintain_incremental(
        &self,
        registry: &mut ViewRegistry,
        tables: &TableSet,
        log: &TransitionLog,
        ep: &mut EpisodeCtx<'_>,
    ) -> Result<()> {
        let mut targets = BTreeSet::new();
        for table in log.touched_tables() {
            for view in registry.dependents_of(table) {
                targets.insert(view.clone());
            }
        }

        for view in targets {
            self.locks.try_acquire(&view, ep.session)?;
            let (descriptor, state) = registry.descriptor_and_state_mut(&view)?;
            if !state.populated() {
                // Nothing to maintain until the view is refreshed with data.
                continue;
            }
            // The last maintainer must be visible under the transaction's
            // own snapshot; a maintainer that committed after this
            // transaction began conflicts even though its lock is gone.
            if let Some(t) = state.last_maintained_by() {
                if t != ep.txn && !ep.snapshot.sees(t) {
                    return Err(MaintenanceError::concurrent_maintenance(&view));
                }
            }

            ep.undo.record(&view, ep.level, state);
            state.set_last_maintained_by(ep.txn);

            let propagator = Propagator::new(tables);
            let delta = propagator.propagate(descriptor, log)?;
            if delta.is_empty() {
                continue;
            }

            ep.ctx.push(ep.level, view.clone());
            MergeEngine::apply(descriptor, state, &delta, &propagator)?;
            ep.ctx.pop();
            debug!(view = %view, txn = ep.txn, "incremental maintenance applied");
        }
        Ok(())
    }

    /// Rebuilds a view from a fresh evaluation of its defining query, or
    /// empties it when `with_data` is false. The caller must already hold
    /// the view's lock.
    pub fn refresh(
        &self,
        registry: &mut ViewRegistry,
        tables: &TableSet,
        view: &str,
        with_data: bool,
        ep: &mut EpisodeCtx<'_>,
    ) -> Result<()> {
        debug_assert!(self.locks.holds(view, ep.session));

        let (descriptor, state) = registry.descriptor_and_state_mut(view)?;
        ep.undo.record(view, ep.level, state);
        state.set_last_maintained_by(ep.txn);
        state.reset(descriptor);

        if with_data {
            let propagator = Propagator::new(tables);
            let delta = propagator.full_delta(descriptor)?;
            ep.ctx.push(ep.level, view.to_string());
            MergeEngine::apply(descriptor, state, &delta, &propagator)?;
            ep.ctx.pop();
            state.set_populated(true);
        }
        debug!(view = %view, txn = ep.txn, with_data, "view refreshed");
        Ok(())
    }
}
