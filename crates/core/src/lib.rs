//! Vireo Core - core types for the Vireo incremental view maintenance engine.
//!
//! This crate provides the foundational types shared by the storage layer and
//! the maintenance engine:
//!
//! - `DataType`: supported column types
//! - `Value`: runtime values with a total ordering (usable as group keys and
//!   MIN/MAX candidates)
//! - `Row`: a row of values with a unique identifier
//! - `TableDef`: base-table schema definitions
//! - `MaintenanceError`: the error taxonomy for maintenance operations
//!
//! # Example
//!
//! ```rust
//! use vireo_core::{DataType, Row, TableDef, Value};
//!
//! let def = TableDef::builder("users")
//!     .column("id", DataType::Int64)
//!     .column("name", DataType::String)
//!     .build()
//!     .unwrap();
//!
//! let row = Row::new(1, vec![Value::Int64(1), Value::String("Alice".into())]);
//! assert_eq!(def.column_count(), 2);
//! assert_eq!(row.get(1), Some(&Value::String("Alice".into())));
//! ```

mod error;
mod row;
mod schema;
mod types;
mod value;

pub use error::{MaintenanceError, Result};
pub use row::{next_row_id, reserve_row_ids, Row, RowId, DETACHED_ROW_ID};
pub use schema::{ColumnDef, TableDef, TableDefBuilder};
pub use types::DataType;
pub use value::Value;
