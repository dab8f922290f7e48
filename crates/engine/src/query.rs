//! View query trees.
//!
//! A view's defining query is a small relational tree over base tables.
//! Aggregation, DISTINCT and set operations may only appear at the root;
//! everything below is scans, filters, projections and inner joins. The
//! eligibility check enforces this before a view is created.

use std::collections::BTreeSet;
use vireo_core::{MaintenanceError, Result, Row, Value};
use vireo_storage::TableSet;

/// Comparison operator in a filter predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Filter predicate over a single row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Compares a column against a constant.
    Compare {
        column: usize,
        op: CmpOp,
        value: Value,
    },
    /// True when the column is NULL.
    IsNull { column: usize },
    /// Both predicates hold.
    And(Box<Predicate>, Box<Predicate>),
    /// Either predicate holds.
    Or(Box<Predicate>, Box<Predicate>),
    /// The predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Builds a column-vs-constant comparison.
    pub fn compare(column: usize, op: CmpOp, value: Value) -> Self {
        Predicate::Compare { column, op, value }
    }

    /// Evaluates the predicate against a row. Comparing against NULL yields
    /// false.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Compare { column, op, value } => match row.get(*column) {
                None | Some(Value::Null) => false,
                Some(v) => {
                    let ord = v.cmp(value);
                    match op {
                        CmpOp::Eq => ord.is_eq(),
                        CmpOp::Ne => ord.is_ne(),
                        CmpOp::Lt => ord.is_lt(),
                        CmpOp::Le => ord.is_le(),
                        CmpOp::Gt => ord.is_gt(),
                        CmpOp::Ge => ord.is_ge(),
                    }
                }
            },
            Predicate::IsNull { column } => {
                matches!(row.get(*column), Some(Value::Null))
            }
            Predicate::And(a, b) => a.matches(row) && b.matches(row),
            Predicate::Or(a, b) => a.matches(row) || b.matches(row),
            Predicate::Not(p) => !p.matches(row),
        }
    }
}

/// Aggregate function over a column (or over rows for COUNT(*)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggFunc {
    /// COUNT(*)
    CountStar,
    /// COUNT(column), ignoring NULLs
    Count(usize),
    /// SUM(column), NULL over no non-null input
    Sum(usize),
    /// AVG(column), NULL over no non-null input
    Avg(usize),
    /// MIN(column), NULL over no non-null input
    Min(usize),
    /// MAX(column), NULL over no non-null input
    Max(usize),
}

impl AggFunc {
    /// Returns the input column, or None for COUNT(*).
    pub fn column(&self) -> Option<usize> {
        match self {
            AggFunc::CountStar => None,
            AggFunc::Count(c)
            | AggFunc::Sum(c)
            | AggFunc::Avg(c)
            | AggFunc::Min(c)
            | AggFunc::Max(c) => Some(*c),
        }
    }
}

/// Set operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOpKind {
    /// Set union: one copy of every row present in either operand.
    Union,
    /// Bag union: operand contents concatenated.
    UnionAll,
    /// Set intersection: rows present in both operands.
    Intersect,
    /// Set difference: rows present on the left and absent on the right.
    Except,
}

/// A node in a view's query tree.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryNode {
    /// Scans a base table.
    Scan { table: String },
    /// Keeps rows matching the predicate.
    Filter {
        input: Box<QueryNode>,
        predicate: Predicate,
    },
    /// Keeps the listed columns, in order.
    Project {
        input: Box<QueryNode>,
        columns: Vec<usize>,
    },
    /// Inner join on column equality pairs (left column, right column).
    Join {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
        on: Vec<(usize, usize)>,
    },
    /// Groups by the listed columns and computes aggregates per group.
    Aggregate {
        input: Box<QueryNode>,
        group_by: Vec<usize>,
        aggregates: Vec<AggFunc>,
    },
    /// Removes duplicate rows.
    Distinct { input: Box<QueryNode> },
    /// Combines two operands with a set operation.
    SetOp {
        op: SetOpKind,
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },
}

impl QueryNode {
    /// Scans a base table.
    pub fn scan(table: impl Into<String>) -> Self {
        QueryNode::Scan {
            table: table.into(),
        }
    }

    /// Wraps this node in a filter.
    pub fn filter(self, predicate: Predicate) -> Self {
        QueryNode::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    /// Wraps this node in a projection.
    pub fn project(self, columns: Vec<usize>) -> Self {
        QueryNode::Project {
            input: Box::new(self),
            columns,
        }
    }

    /// Joins this node with another on column equality pairs.
    pub fn join(self, right: QueryNode, on: Vec<(usize, usize)>) -> Self {
        QueryNode::Join {
            left: Box::new(self),
            right: Box::new(right),
            on,
        }
    }

    /// Wraps this node in an aggregation.
    pub fn aggregate(self, group_by: Vec<usize>, aggregates: Vec<AggFunc>) -> Self {
        QueryNode::Aggregate {
            input: Box::new(self),
            group_by,
            aggregates,
        }
    }

    /// Wraps this node in duplicate removal.
    pub fn distinct(self) -> Self {
        QueryNode::Distinct {
            input: Box::new(self),
        }
    }

    /// Combines two nodes with a set operation.
    pub fn set_op(op: SetOpKind, left: QueryNode, right: QueryNode) -> Self {
        QueryNode::SetOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Returns every base table this tree references.
    pub fn tables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_tables(&mut out);
        out
    }

    fn collect_tables(&self, out: &mut BTreeSet<String>) {
        match self {
            QueryNode::Scan { table } => {
                out.insert(table.clone());
            }
            QueryNode::Filter { input, .. }
            | QueryNode::Project { input, .. }
            | QueryNode::Aggregate { input, .. }
            | QueryNode::Distinct { input } => input.collect_tables(out),
            QueryNode::Join { left, right, .. } | QueryNode::SetOp { left, right, .. } => {
                left.collect_tables(out);
                right.collect_tables(out);
            }
        }
    }
}

/// Evaluates a query subtree against the current base tables, returning the
/// result as a bag of detached rows.
///
/// Only the relational part of a tree is evaluated here; aggregation,
/// DISTINCT and set operations are root-only constructs folded by the merge
/// engine, so hitting one of them below the root is an eligibility bug.
pub fn evaluate(node: &QueryNode, tables: &TableSet) -> Result<Vec<Row>> {
    match node {
        QueryNode::Scan { table } => {
            let store = tables.table(table)?;
            Ok(store
                .rows()
                .map(|r| Row::detached(r.values.clone()))
                .collect())
        }
        QueryNode::Filter { input, predicate } => {
            let rows = evaluate(input, tables)?;
            Ok(rows.into_iter().filter(|r| predicate.matches(r)).collect())
        }
        QueryNode::Project { input, columns } => {
            let rows = evaluate(input, tables)?;
            Ok(rows.into_iter().map(|r| project_row(&r, columns)).collect())
        }
        QueryNode::Join { left, right, on } => {
            let lhs = evaluate(left, tables)?;
            let rhs = evaluate(right, tables)?;
            let mut out = Vec::new();
            for l in &lhs {
                for r in &rhs {
                    if join_matches(l, r, on) {
                        out.push(join_rows(l, r));
                    }
                }
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

/// Projects a row onto the listed columns. Missing columns become NULL.
pub fn project_row(row: &Row, columns: &[usize]) -> Row {
    Row::detached(
        columns
            .iter()
            .map(|&c| row.get(c).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

/// Returns true if the join columns of both rows are equal and non-NULL.
pub fn join_matches(left: &Row, right: &Row, on: &[(usize, usize)]) -> bool {
    on.iter().all(|&(lc, rc)| match (left.get(lc), right.get(rc)) {
        (Some(a), Some(b)) => !a.is_null() && !b.is_null() && a == b,
        _ => false,
    })
}

/// Concatenates two rows into a detached join result.
pub fn join_rows(left: &Row, right: &Row) -> Row {
    let mut values = Vec::with_capacity(left.len() + right.len());
    values.extend(left.values.iter().cloned());
    values.extend(right.values.iter().cloned());
    Row::detached(values)
}
