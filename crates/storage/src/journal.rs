//! Undo journal for base-table changes.
//!
//! Every base-table write in a transaction is journaled together with the
//! subtransaction level it happened at. Rolling back to a savepoint pops the
//! suffix of entries at or above that level and applies each change in
//! reverse. Statement-level rollback uses positional marks instead.

use crate::store::TableSet;
use vireo_core::{Result, Row};

/// The change recorded by a journal entry.
#[derive(Clone, Debug)]
pub enum RowChange {
    /// A row was inserted.
    Insert { table: String, row: Row },
    /// A row was updated in place.
    Update { table: String, old: Row, new: Row },
    /// A row was deleted.
    Delete { table: String, row: Row },
}

impl RowChange {
    /// Returns the table this change touched.
    pub fn table(&self) -> &str {
        match self {
            RowChange::Insert { table, .. } => table,
            RowChange::Update { table, .. } => table,
            RowChange::Delete { table, .. } => table,
        }
    }
}

/// A journaled change tagged with its subtransaction level.
#[derive(Clone, Debug)]
pub struct JournalEntry {
    /// Subtransaction level the change happened at (1 = top level).
    pub level: u32,
    /// The change itself.
    pub change: RowChange,
}

/// Level-tagged undo log for one transaction.
///
/// Entry levels are non-decreasing: savepoints only raise the current level
/// and rollback pops a suffix, so popping from the tail while the level is
/// at or above the rollback target undoes exactly the right changes.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an insert.
    pub fn record_insert(&mut self, level: u32, table: impl Into<String>, row: Row) {
        self.entries.push(JournalEntry {
            level,
            change: RowChange::Insert {
                table: table.into(),
                row,
            },
        });
    }

    /// Records an update.
    pub fn record_update(&mut self, level: u32, table: impl Into<String>, old: Row, new: Row) {
        self.entries.push(JournalEntry {
            level,
            change: RowChange::Update {
                table: table.into(),
                old,
                new,
            },
        });
    }

    /// Records a delete.
    pub fn record_delete(&mut self, level: u32, table: impl Into<String>, row: Row) {
        self.entries.push(JournalEntry {
            level,
            change: RowChange::Delete {
                table: table.into(),
                row,
            },
        });
    }

    /// Returns a positional mark for statement-level rollback.
    #[inline]
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of journaled changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been journaled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undoes every change recorded after `mark`, newest first.
    pub fn rollback_to_mark(&mut self, mark: usize, tables: &mut TableSet) -> Result<()> {
        while self.entries.len() > mark {
            if let Some(entry) = self.entries.pop() {
                revert(&entry.change, tables)?;
            }
        }
        Ok(())
    }

    /// Undoes every change recorded at or above `level`, newest first.
    pub fn rollback_level(&mut self, level: u32, tables: &mut TableSet) -> Result<()> {
        while self.entries.last().is_some_and(|e| e.level >= level) {
            if let Some(entry) = self.entries.pop() {
                revert(&entry.change, tables)?;
            }
        }
        Ok(())
    }

    /// Re-tags entries at or above `level` to the enclosing level. Called
    /// when a savepoint is released, so its changes roll back with the outer
    /// scope rather than with a later savepoint that reuses the level.
    pub fn release_level(&mut self, level: u32) {
        debug_assert!(level > 1);
        for entry in self.entries.iter_mut().rev() {
            if entry.level < level {
                break;
            }
            entry.level = level - 1;
        }
    }

    /// Discards all entries without undoing them. Used at commit.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn revert(change: &RowChange, tables: &mut TableSet) -> Result<()> {
    match change {
        RowChange::Insert { table, row } => {
            tables.table_mut(table)?.remove(row.id);
        }
        RowChange::Update { table, old, .. } => {
            tables.table_mut(table)?.insert(old.clone())?;
        }
        RowChange::Delete { table, row } => {
            tables.table_mut(table)?.insert(row.clone())?;
        }
    }
    Ok(())
}
