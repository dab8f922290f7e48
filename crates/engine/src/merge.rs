//! Merging propagated deltas into persisted view state.
//!
//! The merge engine owns every write to view contents. It folds row deltas
//! into multiplicities, maintains group accumulators, and enforces the
//! bookkeeping invariants: a multiplicity or group count that would go
//! negative means the persisted state disagrees with the delta stream and
//! maintenance stops with a corruption error instead of writing a wrong
//! result.
//!
//! Within a grouped delta, deletions apply before insertions so a MIN/MAX
//! rescan sees the smallest possible window of the post-statement input.

use crate::aggregate::DeleteOutcome;
use crate::delta::{Delta, DeltaBatch};
use crate::propagate::ResultDelta;
use crate::view::{GroupState, OperandCounts, StateStore, ViewDescriptor, ViewShape, ViewState};
use hashbrown::HashMap;
use tracing::trace;
use vireo_core::{MaintenanceError, Result, Value};

/// Seam for re-deriving a group's aggregate input when an extremum is
/// deleted. Implemented by the propagator, which is the only maintenance
/// component allowed to read base tables.
pub trait GroupRescan {
    /// Returns the group's remaining non-null input values for `column`.
    fn rescan(&self, descriptor: &ViewDescriptor, group: &[Value], column: usize)
        -> Result<Vec<Value>>;
}

/// Applies shaped deltas to view state.
pub struct MergeEngine;

impl MergeEngine {
    /// Merges a delta into the view's persisted state.
    pub fn apply(
        descriptor: &ViewDescriptor,
        state: &mut ViewState,
        delta: &ResultDelta,
        rescan: &dyn GroupRescan,
    ) -> Result<()> {
        let view = descriptor.name().to_string();
        match (state.store_mut(), delta) {
            (StateStore::Plain { rows }, ResultDelta::Rows(batch)) => {
                merge_multiplicities(&view, rows, batch)
            }
            (StateStore::Distinct { rows }, ResultDelta::Distinct(batch)) => {
                merge_multiplicities(&view, rows, batch)
            }
            (StateStore::Grouped { groups }, ResultDelta::Grouped { input }) => {
                merge_groups(descriptor, groups, input, rescan)
            }
            (StateStore::SetOp { rows }, ResultDelta::SetOp { left, right }) => {
                merge_set_op(&view, rows, left, right)
            }
            _ => Err(MaintenanceError::state_corruption(
                view,
                "delta shape does not match the view's state",
            )),
        }
    }
}

fn merge_multiplicities(
    view: &str,
    rows: &mut HashMap<Vec<Value>, i64>,
    batch: &DeltaBatch,
) -> Result<()> {
    for delta in batch {
        let mult = rows.entry(delta.row.values.clone()).or_insert(0);
        *mult += delta.diff;
        if *mult < 0 {
            return Err(MaintenanceError::state_corruption(
                view,
                format!("multiplicity of {:?} went negative", delta.row.values),
            ));
        }
        if *mult == 0 {
            rows.remove(&delta.row.values);
        }
    }
    trace!(view, changes = batch.len(), "merged row deltas");
    Ok(())
}

fn merge_groups(
    descriptor: &ViewDescriptor,
    groups: &mut HashMap<Vec<Value>, GroupState>,
    input: &DeltaBatch,
    rescan: &dyn GroupRescan,
) -> Result<()> {
    let view = descriptor.name();
    let (group_by, aggregates) = match descriptor.shape() {
        ViewShape::Grouped {
            group_by,
            aggregates,
        } => (group_by, aggregates),
        _ => {
            return Err(MaintenanceError::state_corruption(
                view,
                "grouped delta for a non-aggregate view",
            ))
        }
    };

    let (deletes, inserts): (Vec<&Delta>, Vec<&Delta>) =
        input.iter().partition(|d| d.is_delete());

    for delta in deletes {
        let key = group_key(delta, &group_by);
        let group = groups.get_mut(&key).ok_or_else(|| {
            MaintenanceError::state_corruption(
                view,
                format!("delete arrived for missing group {key:?}"),
            )
        })?;
        let times = -delta.diff;
        group.count -= times;
        if group.count < 0 {
            return Err(MaintenanceError::state_corruption(
                view,
                format!("group {key:?} count went negative"),
            ));
        }
        for acc in &mut group.accs {
            let value = acc
                .column()
                .and_then(|c| delta.row.get(c))
                .cloned()
                .unwrap_or(Value::Null);
            match acc.delete(&value, times) {
                DeleteOutcome::Done => {}
                DeleteOutcome::NeedsRescan { column } => {
                    let values = rescan.rescan(descriptor, &key, column)?;
                    if values.is_empty() && acc.non_null().unwrap_or(0) > 0 {
                        return Err(MaintenanceError::state_corruption(
                            view,
                            format!(
                                "group {key:?} claims non-null inputs but a rescan found none"
                            ),
                        ));
                    }
                    acc.reset_extremum(&values);
                }
                DeleteOutcome::Corrupt(detail) => {
                    return Err(MaintenanceError::state_corruption(view, detail));
                }
            }
        }
        if group.count == 0 {
            groups.remove(&key);
        }
    }

    for delta in inserts {
        let key = group_key(delta, &group_by);
        let group = groups
            .entry(key)
            .or_insert_with(|| GroupState::new(&aggregates));
        group.count += delta.diff;
        for acc in &mut group.accs {
            let value = acc
                .column()
                .and_then(|c| delta.row.get(c))
                .cloned()
                .unwrap_or(Value::Null);
            acc.insert(&value, delta.diff);
        }
    }

    trace!(view, changes = input.len(), "merged grouped deltas");
    Ok(())
}

fn merge_set_op(
    view: &str,
    rows: &mut HashMap<Vec<Value>, OperandCounts>,
    left: &DeltaBatch,
    right: &DeltaBatch,
) -> Result<()> {
    for delta in left {
        let counts = rows.entry(delta.row.values.clone()).or_default();
        counts.left += delta.diff;
        if counts.left < 0 {
            return Err(MaintenanceError::state_corruption(
                view,
                format!("left multiplicity of {:?} went negative", delta.row.values),
            ));
        }
        if counts.left == 0 && counts.right == 0 {
            rows.remove(&delta.row.values);
        }
    }
    for delta in right {
        let counts = rows.entry(delta.row.values.clone()).or_default();
        counts.right += delta.diff;
        if counts.right < 0 {
            return Err(MaintenanceError::state_corruption(
                view,
                format!("right multiplicity of {:?} went negative", delta.row.values),
            ));
        }
        if counts.left == 0 && counts.right == 0 {
            rows.remove(&delta.row.values);
        }
    }
    Ok(())
}

fn group_key(delta: &Delta, group_by: &[usize]) -> Vec<Value> {
    group_by
        .iter()
        .map(|&c| delta.row.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}
