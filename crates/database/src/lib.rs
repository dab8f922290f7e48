//! Vireo Database - an embedded database with incrementally maintained views.
//!
//! # Example
//!
//! ```rust
//! use vireo_database::{AggFunc, Database, DataType, QueryNode, TableDef, Value};
//!
//! let db = Database::new();
//! db.create_table(
//!     TableDef::builder("orders")
//!         .column("user_id", DataType::Int64)
//!         .column("amount", DataType::Int64)
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! let mut session = db.connect();
//! session
//!     .create_view(
//!         "order_counts",
//!         QueryNode::scan("orders").aggregate(vec![0], vec![AggFunc::CountStar]),
//!         true,
//!     )
//!     .unwrap();
//!
//! session
//!     .insert("orders", vec![Value::Int64(1), Value::Int64(250)])
//!     .unwrap();
//!
//! let rows = session.query_view("order_counts").unwrap();
//! assert_eq!(rows[0].values, vec![Value::Int64(1), Value::Int64(1)]);
//! ```

mod database;
mod eligibility;
mod session;

pub use database::Database;
pub use eligibility::check_eligibility;
pub use session::Session;

pub use vireo_core::{
    ColumnDef, DataType, MaintenanceError, Result, Row, TableDef, Value,
};
pub use vireo_engine::{AggFunc, CmpOp, Predicate, QueryNode, SetOpKind};
