//! View descriptors and persisted view state.

use crate::aggregate::Accumulator;
use crate::query::{AggFunc, QueryNode, SetOpKind};
use hashbrown::HashMap;
use vireo_core::{Row, Value};
use vireo_storage::TxnId;

/// A registered view: its name and defining query.
#[derive(Clone, Debug)]
pub struct ViewDescriptor {
    name: String,
    query: QueryNode,
}

impl ViewDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, query: QueryNode) -> Self {
        ViewDescriptor {
            name: name.into(),
            query,
        }
    }

    /// Returns the view name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the defining query.
    #[inline]
    pub fn query(&self) -> &QueryNode {
        &self.query
    }

    /// Returns the shape of the persisted state this query needs.
    pub fn shape(&self) -> ViewShape {
        match &self.query {
            QueryNode::Aggregate {
                group_by,
                aggregates,
                ..
            } => ViewShape::Grouped {
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
            },
            QueryNode::Distinct { .. } => ViewShape::Distinct,
            QueryNode::SetOp { op, .. } if *op != SetOpKind::UnionAll => ViewShape::SetOp(*op),
            _ => ViewShape::Plain,
        }
    }
}

/// How a view's contents are stored and folded.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewShape {
    /// A bag of rows with multiplicities.
    Plain,
    /// A set of rows with hidden multiplicities.
    Distinct,
    /// One entry per group with aggregate accumulators.
    Grouped {
        group_by: Vec<usize>,
        aggregates: Vec<AggFunc>,
    },
    /// Rows with one multiplicity per set-operation operand.
    SetOp(SetOpKind),
}

/// Aggregate state for one group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupState {
    /// Number of input rows in the group.
    pub count: i64,
    /// One accumulator per aggregate, in output order.
    pub accs: Vec<Accumulator>,
}

impl GroupState {
    /// Creates the empty state for a list of aggregates.
    pub fn new(aggregates: &[AggFunc]) -> Self {
        GroupState {
            count: 0,
            accs: aggregates.iter().map(|&f| Accumulator::new(f)).collect(),
        }
    }
}

/// Per-operand multiplicities for a set-operation view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperandCounts {
    pub left: i64,
    pub right: i64,
}

/// The stored contents of a view, keyed by row values.
#[derive(Clone, Debug)]
pub enum StateStore {
    Plain {
        rows: HashMap<Vec<Value>, i64>,
    },
    Distinct {
        rows: HashMap<Vec<Value>, i64>,
    },
    Grouped {
        groups: HashMap<Vec<Value>, GroupState>,
    },
    SetOp {
        rows: HashMap<Vec<Value>, OperandCounts>,
    },
}

/// Persisted state of a view, including the maintenance bookkeeping that
/// travels with its contents.
#[derive(Clone, Debug)]
pub struct ViewState {
    populated: bool,
    last_maintained_by: Option<TxnId>,
    store: StateStore,
}

impl ViewState {
    /// Creates the empty, unpopulated state for a descriptor.
    pub fn new(descriptor: &ViewDescriptor) -> Self {
        ViewState {
            populated: false,
            last_maintained_by: None,
            store: empty_store(&descriptor.shape()),
        }
    }

    /// Returns true if the view holds data.
    #[inline]
    pub fn populated(&self) -> bool {
        self.populated
    }

    /// Marks the view populated or not.
    pub fn set_populated(&mut self, populated: bool) {
        self.populated = populated;
    }

    /// Returns the transaction that last maintained this view.
    #[inline]
    pub fn last_maintained_by(&self) -> Option<TxnId> {
        self.last_maintained_by
    }

    /// Records the transaction maintaining this view.
    pub fn set_last_maintained_by(&mut self, txn: TxnId) {
        self.last_maintained_by = Some(txn);
    }

    /// Empties the stored contents, keeping the shape.
    pub fn reset(&mut self, descriptor: &ViewDescriptor) {
        self.store = empty_store(&descriptor.shape());
        self.populated = false;
    }

    pub(crate) fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// Materializes the view's visible rows, sorted by value for
    /// deterministic output.
    pub fn visible_rows(&self, descriptor: &ViewDescriptor) -> Vec<Row> {
        let mut out: Vec<Vec<Value>> = match &self.store {
            StateStore::Plain { rows } => rows
                .iter()
                .flat_map(|(values, &mult)| {
                    std::iter::repeat_with(|| values.clone()).take(mult.max(0) as usize)
                })
                .collect(),
            StateStore::Distinct { rows } => rows
                .iter()
                .filter(|(_, &mult)| mult > 0)
                .map(|(values, _)| values.clone())
                .collect(),
            StateStore::Grouped { groups } => {
                let mut rows: Vec<Vec<Value>> = groups
                    .iter()
                    .map(|(key, group)| group_output(key, group))
                    .collect();
                // An aggregate without GROUP BY always yields one row.
                if rows.is_empty() {
                    if let ViewShape::Grouped {
                        group_by,
                        aggregates,
                    } = descriptor.shape()
                    {
                        if group_by.is_empty() {
                            rows.push(group_output(&[], &GroupState::new(&aggregates)));
                        }
                    }
                }
                rows
            }
            StateStore::SetOp { rows } => {
                let op = match descriptor.shape() {
                    ViewShape::SetOp(op) => op,
                    _ => SetOpKind::Union,
                };
                rows.iter()
                    .filter(|(_, counts)| set_op_visible(op, counts))
                    .map(|(values, _)| values.clone())
                    .collect()
            }
        };
        out.sort();
        out.into_iter().map(Row::detached).collect()
    }
}

fn empty_store(shape: &ViewShape) -> StateStore {
    match shape {
        ViewShape::Plain => StateStore::Plain {
            rows: HashMap::new(),
        },
        ViewShape::Distinct => StateStore::Distinct {
            rows: HashMap::new(),
        },
        ViewShape::Grouped { .. } => StateStore::Grouped {
            groups: HashMap::new(),
        },
        ViewShape::SetOp(_) => StateStore::SetOp {
            rows: HashMap::new(),
        },
    }
}

fn group_output(key: &[Value], group: &GroupState) -> Vec<Value> {
    let mut values = key.to_vec();
    values.extend(group.accs.iter().map(|acc| acc.output()));
    values
}

fn set_op_visible(op: SetOpKind, counts: &OperandCounts) -> bool {
    match op {
        SetOpKind::Union | SetOpKind::UnionAll => counts.left + counts.right > 0,
        SetOpKind::Intersect => counts.left > 0 && counts.right > 0,
        SetOpKind::Except => counts.left > 0 && counts.right == 0,
    }
}
