//! Session-scoped maintenance context.
//!
//! While the engine is writing a view's contents, a suppression entry for
//! that view sits on the context stack and the direct-write guard lets the
//! write through. Entries are tagged with the subtransaction level they were
//! pushed at; aborting a subtransaction pops every entry pushed at or below
//! it in the abort, so an error inside maintenance cannot leave the guard
//! disabled.

use tracing::debug;
use vireo_core::{MaintenanceError, Result};

/// One suppression entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuppressionEntry {
    /// Subtransaction level the entry was pushed at.
    pub level: u32,
    /// View whose guard is suppressed.
    pub view: String,
}

/// Per-session maintenance state: the suppression stack.
#[derive(Clone, Debug, Default)]
pub struct MaintenanceContext {
    stack: Vec<SuppressionEntry>,
}

impl MaintenanceContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a suppression entry for `view`.
    pub fn push(&mut self, level: u32, view: impl Into<String>) {
        self.stack.push(SuppressionEntry {
            level,
            view: view.into(),
        });
    }

    /// Pops the most recent entry.
    pub fn pop(&mut self) -> Option<SuppressionEntry> {
        self.stack.pop()
    }

    /// Returns true if the guard for `view` is currently suppressed.
    pub fn is_suppressed(&self, view: &str) -> bool {
        self.stack.iter().any(|e| e.view == view)
    }

    /// Returns the stack depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Rejects a direct write to `view` unless maintenance suppressed the
    /// guard for it.
    pub fn check_direct_write(&self, view: &str) -> Result<()> {
        if self.is_suppressed(view) {
            Ok(())
        } else {
            Err(MaintenanceError::direct_write_rejected(view))
        }
    }

    /// Abort hook: drops every entry pushed at or above the aborted level.
    pub fn at_abort(&mut self, level: u32) {
        let before = self.stack.len();
        self.stack.retain(|e| e.level < level);
        if self.stack.len() != before {
            debug!(
                level,
                dropped = before - self.stack.len(),
                "dropped suppression entries at abort"
            );
        }
    }

    /// Drops everything. Used at transaction end.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
