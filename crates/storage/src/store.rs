//! In-memory base-table storage.

use std::collections::BTreeMap;
use vireo_core::{MaintenanceError, Result, Row, RowId, TableDef};

/// Storage for a single base table.
///
/// Rows are keyed by id in a `BTreeMap` so scans are deterministic.
#[derive(Clone, Debug)]
pub struct TableStore {
    def: TableDef,
    rows: BTreeMap<RowId, Row>,
}

impl TableStore {
    /// Creates an empty store for the given table definition.
    pub fn new(def: TableDef) -> Self {
        TableStore {
            def,
            rows: BTreeMap::new(),
        }
    }

    /// Returns the table definition.
    #[inline]
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// Inserts a row. The row's column count must match the schema.
    pub fn insert(&mut self, row: Row) -> Result<()> {
        if row.len() != self.def.column_count() {
            return Err(MaintenanceError::invalid_schema(format!(
                "row has {} values but table \"{}\" has {} columns",
                row.len(),
                self.name(),
                self.def.column_count()
            )));
        }
        self.rows.insert(row.id, row);
        Ok(())
    }

    /// Removes a row by id, returning it if present.
    pub fn remove(&mut self, row_id: RowId) -> Option<Row> {
        self.rows.remove(&row_id)
    }

    /// Returns the row with the given id.
    pub fn get(&self, row_id: RowId) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Iterates over all rows in id order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The set of all base tables in a database.
#[derive(Clone, Debug, Default)]
pub struct TableSet {
    tables: BTreeMap<String, TableStore>,
}

impl TableSet {
    /// Creates an empty table set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new base table.
    pub fn create_table(&mut self, def: TableDef) -> Result<()> {
        let name = def.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(MaintenanceError::invalid_schema(format!(
                "table \"{name}\" already exists"
            )));
        }
        self.tables.insert(name, TableStore::new(def));
        Ok(())
    }

    /// Returns the named table.
    pub fn table(&self, name: &str) -> Result<&TableStore> {
        self.tables
            .get(name)
            .ok_or_else(|| MaintenanceError::table_not_found(name))
    }

    /// Returns the named table mutably.
    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableStore> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| MaintenanceError::table_not_found(name))
    }

    /// Returns true if the named table exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the names of all tables.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }
}
