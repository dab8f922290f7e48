//! Eligibility check for incrementally maintainable queries.
//!
//! A view query qualifies for incremental maintenance when aggregation,
//! DISTINCT and set operations appear only at the root and everything below
//! is scans, filters, projections and inner joins. The check runs once at
//! view creation so maintenance never meets a shape it cannot handle.

use vireo_core::{MaintenanceError, Result};
use vireo_engine::QueryNode;

/// Validates that a view query can be maintained incrementally.
pub fn check_eligibility(query: &QueryNode) -> Result<()> {
    match query {
        QueryNode::Aggregate {
            input, aggregates, ..
        } => {
            if aggregates.is_empty() {
                return Err(MaintenanceError::ineligible_query(
                    "an aggregate view needs at least one aggregate function",
                ));
            }
            check_relational(input)
        }
        QueryNode::Distinct { input } => check_relational(input),
        QueryNode::SetOp { left, right, .. } => {
            check_relational(left)?;
            check_relational(right)
        }
        node => check_relational(node),
    }
}

fn check_relational(node: &QueryNode) -> Result<()> {
    match node {
        QueryNode::Scan { .. } => Ok(()),
        QueryNode::Filter { input, .. } | QueryNode::Project { input, .. } => {
            check_relational(input)
        }
        QueryNode::Join { left, right, on } => {
            if on.is_empty() {
                return Err(MaintenanceError::ineligible_query(
                    "joins must have at least one equality condition",
                ));
            }
            check_relational(left)?;
            check_relational(right)
        }
        QueryNode::Aggregate { .. } => Err(MaintenanceError::ineligible_query(
            "aggregation is only supported at the top level of a view query",
        )),
        QueryNode::Distinct { .. } => Err(MaintenanceError::ineligible_query(
            "DISTINCT is only supported at the top level of a view query",
        )),
        QueryNode::SetOp { .. } => Err(MaintenanceError::ineligible_query(
            "set operations are only supported at the top level of a view query",
        )),
    }
}
