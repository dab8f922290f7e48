//! Delta propagation through view query trees.
//!
//! Propagation runs after a statement has been applied, so base tables hold
//! post-statement contents. For a join the delta is
//!
//! ```text
//! d(L JOIN R) = dL JOIN R' + L' JOIN dR - dL JOIN dR
//! ```
//!
//! where `L'` and `R'` are the post-statement operands. The rule is exact
//! even when both sides changed in the same statement, including self-joins.

use crate::delta::{Delta, DeltaBatch, DeltaBatchExt};
use crate::merge::GroupRescan;
use crate::query::{self, QueryNode, SetOpKind};
use crate::transition::TransitionLog;
use crate::view::ViewDescriptor;
use tracing::trace;
use vireo_core::{MaintenanceError, Result, Value};
use vireo_storage::TableSet;

/// The change a maintenance episode applies to one view, shaped for the
/// view's store.
#[derive(Clone, Debug)]
pub enum ResultDelta {
    /// Row-level changes for a plain (or UNION ALL) view.
    Rows(DeltaBatch),
    /// Row-level changes folded into hidden multiplicities.
    Distinct(DeltaBatch),
    /// Changes to an aggregate's input rows, before grouping.
    Grouped { input: DeltaBatch },
    /// Per-operand changes for a set-operation view.
    SetOp { left: DeltaBatch, right: DeltaBatch },
}

impl ResultDelta {
    /// Returns true if the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            ResultDelta::Rows(b) | ResultDelta::Distinct(b) | ResultDelta::Grouped { input: b } => {
                b.is_empty()
            }
            ResultDelta::SetOp { left, right } => left.is_empty() && right.is_empty(),
        }
    }
}

/// Computes view deltas from a statement's transition log.
pub struct Propagator<'a> {
    tables: &'a TableSet,
}

impl<'a> Propagator<'a> {
    /// Creates a propagator over the current base tables.
    pub fn new(tables: &'a TableSet) -> Self {
        Propagator { tables }
    }

    /// Computes the view's delta for one statement.
    pub fn propagate(&self, descriptor: &ViewDescriptor, log: &TransitionLog) -> Result<ResultDelta> {
        let delta = self.shaped_delta(descriptor.query(), |node| self.delta_of(node, log))?;
        trace!(view = descriptor.name(), "propagated statement delta");
        Ok(delta)
    }

    /// Computes the delta that takes an empty view to the query's full
    /// current result. Used by refresh and initial population.
    pub fn full_delta(&self, descriptor: &ViewDescriptor) -> Result<ResultDelta> {
        self.shaped_delta(descriptor.query(), |node| {
            let rows = query::evaluate(node, self.tables)?;
            Ok(rows.into_iter().map(Delta::insert).collect())
        })
    }

    /// Shapes the root of the query tree, delegating subtree deltas to `f`.
    fn shaped_delta<F>(&self, root: &QueryNode, f: F) -> Result<ResultDelta>
    where
        F: Fn(&QueryNode) -> Result<DeltaBatch>,
    {
        match root {
            QueryNode::Aggregate { input, .. } => Ok(ResultDelta::Grouped {
                input: f(input)?.consolidate(),
            }),
            QueryNode::Distinct { input } => Ok(ResultDelta::Distinct(f(input)?.consolidate())),
            QueryNode::SetOp { op, left, right } if *op == SetOpKind::UnionAll => {
                let mut batch = f(left)?;
                batch.extend(f(right)?);
                Ok(ResultDelta::Rows(batch.consolidate()))
            }
            QueryNode::SetOp { left, right, .. } => Ok(ResultDelta::SetOp {
                left: f(left)?.consolidate(),
                right: f(right)?.consolidate(),
            }),
            node => Ok(ResultDelta::Rows(f(node)?.consolidate())),
        }
    }

    /// Computes the delta of a relational subtree.
    fn delta_of(&self, node: &QueryNode, log: &TransitionLog) -> Result<DeltaBatch> {
        match node {
            QueryNode::Scan { table } => Ok(log
                .table(table)
                .map(|t| t.to_deltas())
                .unwrap_or_default()),
            QueryNode::Filter { input, predicate } => {
                let batch = self.delta_of(input, log)?;
                Ok(batch
                    .into_iter()
                    .filter(|d| predicate.matches(&d.row))
                    .collect())
            }
            QueryNode::Project { input, columns } => {
                let batch = self.delta_of(input, log)?;
                Ok(batch
                    .into_iter()
                    .map(|d| Delta::new(query::project_row(&d.row, columns), d.diff))
                    .collect())
            }
            QueryNode::Join { left, right, on } => {
                let dl = self.delta_of(left, log)?;
                let dr = self.delta_of(right, log)?;
                if dl.is_empty() && dr.is_empty() {
                    return Ok(Vec::new());
                }

                let mut out = Vec::new();
                if !dl.is_empty() {
                    let full_right: DeltaBatch = query::evaluate(right, self.tables)?
                        .into_iter()
                        .map(Delta::insert)
                        .collect();
                    out.extend(join_deltas(&dl, &full_right, on));
                }
                if !dr.is_empty() {
                    let full_left: DeltaBatch = query::evaluate(left, self.tables)?
                        .into_iter()
                        .map(Delta::insert)
                        .collect();
                    out.extend(join_deltas(&full_left, &dr, on));
                }
                if !dl.is_empty() && !dr.is_empty() {
                    out.extend(join_deltas(&dl, &dr, on).into_iter().map(|d| d.negated()));
                }
                Ok(out)
            }
            QueryNode::Aggregate { .. } | QueryNode::Distinct { .. } | QueryNode::SetOp { .. } => {
                Err(MaintenanceError::ineligible_query(
                    "aggregation, DISTINCT and set operations are only supported at the top level",
                ))
            }
        }
    }
}

impl GroupRescan for Propagator<'_> {
    fn rescan(&self, descriptor: &ViewDescriptor, group: &[Value], column: usize) -> Result<Vec<Value>> {
        let (input, group_by) = match descriptor.query() {
            QueryNode::Aggregate {
                input, group_by, ..
            } => (input.as_ref(), group_by.as_slice()),
            _ => {
                return Err(MaintenanceError::state_corruption(
                    descriptor.name(),
                    "group rescan requested for a non-aggregate view",
                ))
            }
        };
        let rows = query::evaluate(input, self.tables)?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                group_by
                    .iter()
                    .zip(group.iter())
                    .all(|(&c, key)| row.get(c) == Some(key))
            })
            .filter_map(|row| match row.get(column) {
                Some(Value::Null) | None => None,
                Some(v) => Some(v.clone()),
            })
            .collect())
    }
}

/// Joins two delta batches; output multiplicities are the products of the
/// input multiplicities.
fn join_deltas(left: &[Delta], right: &[Delta], on: &[(usize, usize)]) -> DeltaBatch {
    let mut out = Vec::new();
    for l in left {
        for r in right {
            if query::join_matches(&l.row, &r.row, on) {
                out.push(Delta::new(query::join_rows(&l.row, &r.row), l.diff * r.diff));
            }
        }
    }
    out
}
