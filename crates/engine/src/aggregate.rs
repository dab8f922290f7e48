//! Per-group aggregate accumulators.
//!
//! COUNT, SUM and AVG are linear in the row multiplicity and never need to
//! look at anything beyond the delta itself. MIN and MAX keep only the
//! current extremum: deleting a non-extremum value is free, deleting the
//! extremum needs a rescan of the group's remaining input rows, and deleting
//! a value outside the range the accumulator believes in means the persisted
//! state is corrupt.

use crate::query::AggFunc;
use vireo_core::Value;

/// What a deletion did to a MIN/MAX accumulator.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The accumulator absorbed the deletion.
    Done,
    /// The deleted value was the current extremum; the caller must rescan
    /// the group's input for this column and call
    /// [`Accumulator::reset_extremum`].
    NeedsRescan { column: usize },
    /// The deleted value lies outside the range the accumulator tracks.
    Corrupt(String),
}

/// Incremental state for one aggregate in one group.
#[derive(Clone, Debug, PartialEq)]
pub enum Accumulator {
    CountStar {
        count: i64,
    },
    Count {
        column: usize,
        non_null: i64,
    },
    Sum {
        column: usize,
        sum: f64,
        non_null: i64,
    },
    Avg {
        column: usize,
        sum: f64,
        non_null: i64,
    },
    Min {
        column: usize,
        candidate: Option<Value>,
        non_null: i64,
    },
    Max {
        column: usize,
        candidate: Option<Value>,
        non_null: i64,
    },
}

impl Accumulator {
    /// Creates the zero accumulator for an aggregate function.
    pub fn new(func: AggFunc) -> Self {
        match func {
            AggFunc::CountStar => Accumulator::CountStar { count: 0 },
            AggFunc::Count(column) => Accumulator::Count {
                column,
                non_null: 0,
            },
            AggFunc::Sum(column) => Accumulator::Sum {
                column,
                sum: 0.0,
                non_null: 0,
            },
            AggFunc::Avg(column) => Accumulator::Avg {
                column,
                sum: 0.0,
                non_null: 0,
            },
            AggFunc::Min(column) => Accumulator::Min {
                column,
                candidate: None,
                non_null: 0,
            },
            AggFunc::Max(column) => Accumulator::Max {
                column,
                candidate: None,
                non_null: 0,
            },
        }
    }

    /// Returns the input column, or None for COUNT(*).
    pub fn column(&self) -> Option<usize> {
        match self {
            Accumulator::CountStar { .. } => None,
            Accumulator::Count { column, .. }
            | Accumulator::Sum { column, .. }
            | Accumulator::Avg { column, .. }
            | Accumulator::Min { column, .. }
            | Accumulator::Max { column, .. } => Some(*column),
        }
    }

    /// Applies an insertion of `value` with multiplicity `diff` (> 0).
    pub fn insert(&mut self, value: &Value, diff: i64) {
        debug_assert!(diff > 0);
        match self {
            Accumulator::CountStar { count } => *count += diff,
            Accumulator::Count { non_null, .. } => {
                if !value.is_null() {
                    *non_null += diff;
                }
            }
            Accumulator::Sum { sum, non_null, .. } | Accumulator::Avg { sum, non_null, .. } => {
                if let Some(n) = value.numeric() {
                    *sum += n * diff as f64;
                    *non_null += diff;
                }
            }
            Accumulator::Min {
                candidate,
                non_null,
                ..
            } => {
                if !value.is_null() {
                    *non_null += diff;
                    let replace = match candidate.as_ref() {
                        Some(c) => value < c,
                        None => true,
                    };
                    if replace {
                        *candidate = Some(value.clone());
                    }
                }
            }
            Accumulator::Max {
                candidate,
                non_null,
                ..
            } => {
                if !value.is_null() {
                    *non_null += diff;
                    let replace = match candidate.as_ref() {
                        Some(c) => value > c,
                        None => true,
                    };
                    if replace {
                        *candidate = Some(value.clone());
                    }
                }
            }
        }
    }

    /// Applies a deletion of `value` with multiplicity `diff` (> 0).
    pub fn delete(&mut self, value: &Value, diff: i64) -> DeleteOutcome {
        debug_assert!(diff > 0);
        match self {
            Accumulator::CountStar { count } => {
                *count -= diff;
                DeleteOutcome::Done
            }
            Accumulator::Count { non_null, .. } => {
                if !value.is_null() {
                    *non_null -= diff;
                }
                DeleteOutcome::Done
            }
            Accumulator::Sum { sum, non_null, .. } | Accumulator::Avg { sum, non_null, .. } => {
                if let Some(n) = value.numeric() {
                    *sum -= n * diff as f64;
                    *non_null -= diff;
                }
                DeleteOutcome::Done
            }
            Accumulator::Min {
                column,
                candidate,
                non_null,
            } => {
                if value.is_null() {
                    return DeleteOutcome::Done;
                }
                *non_null -= diff;
                let cur = match candidate.as_ref() {
                    Some(c) => c.clone(),
                    None => {
                        return DeleteOutcome::Corrupt(
                            "deleted a value from a minimum with no candidate".to_string(),
                        )
                    }
                };
                if *value < cur {
                    DeleteOutcome::Corrupt(format!(
                        "deleted value {value:?} is below the tracked minimum {cur:?}"
                    ))
                } else if *value == cur {
                    if *non_null <= 0 {
                        *candidate = None;
                        DeleteOutcome::Done
                    } else {
                        DeleteOutcome::NeedsRescan { column: *column }
                    }
                } else {
                    DeleteOutcome::Done
                }
            }
            Accumulator::Max {
                column,
                candidate,
                non_null,
            } => {
                if value.is_null() {
                    return DeleteOutcome::Done;
                }
                *non_null -= diff;
                let cur = match candidate.as_ref() {
                    Some(c) => c.clone(),
                    None => {
                        return DeleteOutcome::Corrupt(
                            "deleted a value from a maximum with no candidate".to_string(),
                        )
                    }
                };
                if *value > cur {
                    DeleteOutcome::Corrupt(format!(
                        "deleted value {value:?} is above the tracked maximum {cur:?}"
                    ))
                } else if *value == cur {
                    if *non_null <= 0 {
                        *candidate = None;
                        DeleteOutcome::Done
                    } else {
                        DeleteOutcome::NeedsRescan { column: *column }
                    }
                } else {
                    DeleteOutcome::Done
                }
            }
        }
    }

    /// Replaces the MIN/MAX candidate after a group rescan. The values are
    /// the group's remaining non-null input values.
    pub fn reset_extremum(&mut self, values: &[Value]) {
        match self {
            Accumulator::Min { candidate, .. } => {
                *candidate = values.iter().min().cloned();
            }
            Accumulator::Max { candidate, .. } => {
                *candidate = values.iter().max().cloned();
            }
            _ => {}
        }
    }

    /// Returns the number of non-null inputs tracked, for accumulators that
    /// track one.
    pub fn non_null(&self) -> Option<i64> {
        match self {
            Accumulator::CountStar { .. } => None,
            Accumulator::Count { non_null, .. }
            | Accumulator::Sum { non_null, .. }
            | Accumulator::Avg { non_null, .. }
            | Accumulator::Min { non_null, .. }
            | Accumulator::Max { non_null, .. } => Some(*non_null),
        }
    }

    /// Returns the aggregate's current output value.
    pub fn output(&self) -> Value {
        match self {
            Accumulator::CountStar { count } => Value::Int64(*count),
            Accumulator::Count { non_null, .. } => Value::Int64(*non_null),
            Accumulator::Sum { sum, non_null, .. } => {
                if *non_null == 0 {
                    Value::Null
                } else {
                    Value::Float64(*sum)
                }
            }
            Accumulator::Avg { sum, non_null, .. } => {
                if *non_null == 0 {
                    Value::Null
                } else {
                    Value::Float64(*sum / *non_null as f64)
                }
            }
            Accumulator::Min { candidate, .. } | Accumulator::Max { candidate, .. } => {
                candidate.clone().unwrap_or(Value::Null)
            }
        }
    }
}
