//! View catalog and table-to-view dependency index.

use crate::view::{ViewDescriptor, ViewState};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use tracing::debug;
use vireo_core::{MaintenanceError, Result};

/// A registered view and its persisted state.
#[derive(Clone, Debug)]
pub struct ViewEntry {
    pub descriptor: ViewDescriptor,
    pub state: ViewState,
}

/// The catalog of all views, with an index from base tables to the views
/// that read them.
///
/// The dependency index is a cache over the catalog and is rebuilt whenever
/// a view is created or dropped.
#[derive(Clone, Debug, Default)]
pub struct ViewRegistry {
    views: BTreeMap<String, ViewEntry>,
    dependents: HashMap<String, Vec<String>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a view.
    pub fn create(&mut self, descriptor: ViewDescriptor) -> Result<()> {
        let name = descriptor.name().to_string();
        if self.views.contains_key(&name) {
            return Err(MaintenanceError::view_already_exists(name));
        }
        let state = ViewState::new(&descriptor);
        self.views.insert(name.clone(), ViewEntry { descriptor, state });
        self.rebuild_index();
        debug!(view = %name, "view registered");
        Ok(())
    }

    /// Removes a view.
    pub fn drop_view(&mut self, name: &str) -> Result<()> {
        if self.views.remove(name).is_none() {
            return Err(MaintenanceError::view_not_found(name));
        }
        self.rebuild_index();
        debug!(view = %name, "view dropped");
        Ok(())
    }

    /// Returns the named view.
    pub fn get(&self, name: &str) -> Result<&ViewEntry> {
        self.views
            .get(name)
            .ok_or_else(|| MaintenanceError::view_not_found(name))
    }

    /// Returns the descriptor and mutable state of the named view.
    pub fn descriptor_and_state_mut(
        &mut self,
        name: &str,
    ) -> Result<(&ViewDescriptor, &mut ViewState)> {
        let entry = self
            .views
            .get_mut(name)
            .ok_or_else(|| MaintenanceError::view_not_found(name))?;
        Ok((&entry.descriptor, &mut entry.state))
    }

    /// Replaces the state of the named view. Used when undoing.
    pub fn restore_state(&mut self, name: &str, state: ViewState) {
        if let Some(entry) = self.views.get_mut(name) {
            entry.state = state;
        }
    }

    /// Returns true if the named view exists.
    pub fn contains(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    /// Returns the names of all registered views.
    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(|s| s.as_str())
    }

    /// Returns the views that read the given base table, in name order.
    pub fn dependents_of(&self, table: &str) -> &[String] {
        self.dependents.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn rebuild_index(&mut self) {
        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for (name, entry) in &self.views {
            for table in entry.descriptor.query().tables() {
                index.entry(table).or_default().push(name.clone());
            }
        }
        self.dependents = index;
    }
}
