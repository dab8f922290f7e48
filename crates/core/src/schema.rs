//! Table schema definitions.

use crate::error::{MaintenanceError, Result};
use crate::types::DataType;

/// Definition of a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    data_type: DataType,
}

impl ColumnDef {
    /// Creates a column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ColumnDef {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Definition of a base table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Starts building a table definition.
    pub fn builder(name: impl Into<String>) -> TableDefBuilder {
        TableDefBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column definitions.
    #[inline]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }
}

/// Builder for [`TableDef`].
pub struct TableDefBuilder {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableDefBuilder {
    /// Adds a column to the definition.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDef::new(name, data_type));
        self
    }

    /// Finishes the definition, validating column names.
    pub fn build(self) -> Result<TableDef> {
        if self.columns.is_empty() {
            return Err(MaintenanceError::invalid_schema(format!(
                "table \"{}\" has no columns",
                self.name
            )));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name() == col.name()) {
                return Err(MaintenanceError::invalid_schema(format!(
                    "duplicate column \"{}\" in table \"{}\"",
                    col.name(),
                    self.name
                )));
            }
        }
        Ok(TableDef {
            name: self.name,
            columns: self.columns,
        })
    }
}
