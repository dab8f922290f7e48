//! Transition deltas captured from base-table statements.
//!
//! Each statement that writes a base table records the exact rows it removed
//! and the exact rows it added. Updates appear as a delete of the old row
//! followed by an insert of the new one. Maintenance runs against this log
//! after the statement has been applied, so base tables already hold the
//! post-statement contents when deltas propagate.

use crate::delta::{Delta, DeltaBatch};
use std::collections::BTreeMap;
use vireo_core::Row;

/// The rows one statement removed from and added to a single table.
#[derive(Clone, Debug, Default)]
pub struct TransitionDelta {
    old_rows: Vec<Row>,
    new_rows: Vec<Row>,
}

impl TransitionDelta {
    /// Creates an empty transition delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a row the statement removed.
    pub fn record_delete(&mut self, row: Row) {
        self.old_rows.push(row);
    }

    /// Records a row the statement added.
    pub fn record_insert(&mut self, row: Row) {
        self.new_rows.push(row);
    }

    /// Records an update as a delete of the old image and an insert of the
    /// new one.
    pub fn record_update(&mut self, old: Row, new: Row) {
        self.old_rows.push(old);
        self.new_rows.push(new);
    }

    /// Returns the removed rows.
    #[inline]
    pub fn old_rows(&self) -> &[Row] {
        &self.old_rows
    }

    /// Returns the added rows.
    #[inline]
    pub fn new_rows(&self) -> &[Row] {
        &self.new_rows
    }

    /// Returns true if the statement changed nothing in this table.
    pub fn is_empty(&self) -> bool {
        self.old_rows.is_empty() && self.new_rows.is_empty()
    }

    /// Converts the captured rows into a signed delta batch.
    pub fn to_deltas(&self) -> DeltaBatch {
        let mut batch = Vec::with_capacity(self.old_rows.len() + self.new_rows.len());
        for row in &self.old_rows {
            batch.push(Delta::delete(row.clone()));
        }
        for row in &self.new_rows {
            batch.push(Delta::insert(row.clone()));
        }
        batch
    }
}

/// Transition deltas for every table one statement touched.
#[derive(Clone, Debug, Default)]
pub struct TransitionLog {
    tables: BTreeMap<String, TransitionDelta>,
}

impl TransitionLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transition delta for `table`, creating it if needed.
    pub fn table_mut(&mut self, table: &str) -> &mut TransitionDelta {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Returns the transition delta for `table` if the statement touched it.
    pub fn table(&self, table: &str) -> Option<&TransitionDelta> {
        self.tables.get(table)
    }

    /// Returns the names of all touched tables.
    pub fn touched_tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    /// Returns true if no table was changed.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|d| d.is_empty())
    }
}
