//! Vireo Engine - incremental view maintenance.
//!
//! The engine turns base-table changes into view updates:
//!
//! 1. A statement's writes are captured as a [`TransitionLog`] of removed
//!    and added rows per table.
//! 2. The [`Propagator`] pushes those changes through the view's query tree,
//!    producing a [`ResultDelta`] shaped for the view's state.
//! 3. The [`MergeEngine`] folds the delta into the persisted [`ViewState`],
//!    maintaining multiplicities and aggregate accumulators.
//! 4. The [`MaintenanceCoordinator`] wraps an episode in the locking,
//!    conflict-detection and undo bookkeeping a transaction needs.
//!
//! Full refresh shares the merge path: it resets the state and merges a
//! delta built from a fresh evaluation of the defining query.

mod aggregate;
mod context;
mod coordinate;
mod delta;
mod merge;
mod propagate;
mod query;
mod registry;
mod transition;
mod view;

pub use aggregate::{Accumulator, DeleteOutcome};
pub use context::{MaintenanceContext, SuppressionEntry};
pub use coordinate::{EpisodeCtx, MaintenanceCoordinator, ViewUndoLog};
pub use delta::{Delta, DeltaBatch, DeltaBatchExt};
pub use merge::{GroupRescan, MergeEngine};
pub use propagate::{Propagator, ResultDelta};
pub use query::{evaluate, AggFunc, CmpOp, Predicate, QueryNode, SetOpKind};
pub use registry::{ViewEntry, ViewRegistry};
pub use transition::{TransitionDelta, TransitionLog};
pub use view::{GroupState, OperandCounts, StateStore, ViewDescriptor, ViewShape, ViewState};
