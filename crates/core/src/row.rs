//! Row type and row id allocation.

use crate::value::Value;
use core::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a row within a table or view.
pub type RowId = u64;

/// Row id used for rows that do not live in any store, such as join and
/// projection intermediates produced during delta propagation.
pub const DETACHED_ROW_ID: RowId = 0;

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates the next unique row id.
#[inline]
pub fn next_row_id() -> RowId {
    NEXT_ROW_ID.fetch_add(1, Ordering::Relaxed)
}

/// Reserves `count` consecutive row ids and returns the first one.
pub fn reserve_row_ids(count: u64) -> RowId {
    NEXT_ROW_ID.fetch_add(count, Ordering::Relaxed)
}

/// A row of values with a unique identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Row {
    /// Unique row identifier
    pub id: RowId,
    /// Column values in schema order
    pub values: Vec<Value>,
}

impl Row {
    /// Creates a row with an explicit id.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Row { id, values }
    }

    /// Creates a row with a freshly allocated id.
    pub fn create(values: Vec<Value>) -> Self {
        Row {
            id: next_row_id(),
            values,
        }
    }

    /// Creates a detached row, used for intermediate results that never
    /// reach a store.
    pub fn detached(values: Vec<Value>) -> Self {
        Row {
            id: DETACHED_ROW_ID,
            values,
        }
    }

    /// Returns the value at the given column index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the number of columns in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_ids_unique() {
        let a = Row::create(vec![Value::Int64(1)]);
        let b = Row::create(vec![Value::Int64(1)]);
        assert_ne!(a.id, b.id);
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_reserve_row_ids() {
        let first = reserve_row_ids(10);
        let after = next_row_id();
        assert!(after >= first + 10);
    }

    #[test]
    fn test_detached_row() {
        let row = Row::detached(vec![Value::Int64(7)]);
        assert_eq!(row.id, DETACHED_ROW_ID);
        assert_eq!(row.get(0), Some(&Value::Int64(7)));
        assert_eq!(row.get(1), None);
        assert_eq!(row.len(), 1);
    }
}
