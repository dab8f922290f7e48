//! Delta type for incremental view maintenance.
//!
//! A delta is a row change with a signed multiplicity: positive for
//! insertion, negative for deletion. All propagation rules are additive in
//! the multiplicity, so a batch of deltas can be applied in any grouping.

use hashbrown::HashMap;
use vireo_core::{Row, Value};

/// A differential change to a row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta {
    /// The changed row
    pub row: Row,
    /// The multiplicity: positive for insert, negative for delete
    pub diff: i64,
}

impl Delta {
    /// Creates a delta with the given row and multiplicity.
    #[inline]
    pub fn new(row: Row, diff: i64) -> Self {
        Self { row, diff }
    }

    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(row: Row) -> Self {
        Self { row, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(row: Row) -> Self {
        Self { row, diff: -1 }
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Returns true if this delta has no effect (diff == 0).
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.diff == 0
    }

    /// Returns a copy with the multiplicity negated.
    #[inline]
    pub fn negated(&self) -> Self {
        Self {
            row: self.row.clone(),
            diff: -self.diff,
        }
    }
}

/// A batch of deltas.
pub type DeltaBatch = Vec<Delta>;

/// Extension trait for working with delta batches.
pub trait DeltaBatchExt {
    /// Combines deltas with equal row values and drops those that cancel.
    fn consolidate(self) -> Self;

    /// Returns the net effect count (sum of all multiplicities).
    fn net_count(&self) -> i64;
}

impl DeltaBatchExt for DeltaBatch {
    fn consolidate(self) -> Self {
        let mut folded: HashMap<Vec<Value>, (Row, i64)> = HashMap::new();
        for d in self {
            match folded.get_mut(&d.row.values) {
                Some((_, diff)) => *diff += d.diff,
                None => {
                    folded.insert(d.row.values.clone(), (d.row, d.diff));
                }
            }
        }
        folded
            .into_values()
            .filter(|(_, diff)| *diff != 0)
            .map(|(row, diff)| Delta::new(row, diff))
            .collect()
    }

    fn net_count(&self) -> i64 {
        self.iter().map(|d| d.diff).sum()
    }
}
