//! Error taxonomy for view maintenance.

use thiserror::Error;

/// Result alias used throughout Vireo.
pub type Result<T> = core::result::Result<T, MaintenanceError>;

/// Errors surfaced by table writes, view maintenance, and refresh.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MaintenanceError {
    /// The view query uses a construct incremental maintenance cannot handle.
    #[error("query is not eligible for incremental maintenance: {reason}")]
    IneligibleQueryShape { reason: String },

    /// Another session holds the maintenance lock for this view.
    #[error("could not obtain lock on view \"{view}\"")]
    LockUnavailable { view: String },

    /// Another in-progress transaction already maintained this view.
    #[error("view \"{view}\" is being incrementally maintained by a concurrent transaction")]
    ConcurrentMaintenanceConflict { view: String },

    /// A direct write to view contents was attempted outside maintenance.
    #[error("cannot change view \"{view}\" directly")]
    DirectWriteRejected { view: String },

    /// Persisted view state no longer agrees with its bookkeeping.
    #[error("state corruption in view \"{view}\": {detail}")]
    StateCorruption { view: String, detail: String },

    /// The named base table does not exist.
    #[error("table \"{name}\" not found")]
    TableNotFound { name: String },

    /// The named view does not exist.
    #[error("view \"{name}\" not found")]
    ViewNotFound { name: String },

    /// A view with this name already exists.
    #[error("view \"{name}\" already exists")]
    ViewAlreadyExists { name: String },

    /// The view holds no data and cannot be queried until refreshed.
    #[error("view \"{name}\" has not been populated")]
    ViewNotPopulated { name: String },

    /// A schema definition was rejected.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// The operation requires an active transaction.
    #[error("no active transaction")]
    TransactionInactive,

    /// A transaction is already active on this session.
    #[error("a transaction is already in progress")]
    TransactionActive,

    /// The named savepoint does not exist in this transaction.
    #[error("savepoint \"{name}\" does not exist")]
    NoSuchSavepoint { name: String },
}

impl MaintenanceError {
    pub fn ineligible_query(reason: impl Into<String>) -> Self {
        MaintenanceError::IneligibleQueryShape {
            reason: reason.into(),
        }
    }

    pub fn lock_unavailable(view: impl Into<String>) -> Self {
        MaintenanceError::LockUnavailable { view: view.into() }
    }

    pub fn concurrent_maintenance(view: impl Into<String>) -> Self {
        MaintenanceError::ConcurrentMaintenanceConflict { view: view.into() }
    }

    pub fn direct_write_rejected(view: impl Into<String>) -> Self {
        MaintenanceError::DirectWriteRejected { view: view.into() }
    }

    pub fn state_corruption(view: impl Into<String>, detail: impl Into<String>) -> Self {
        MaintenanceError::StateCorruption {
            view: view.into(),
            detail: detail.into(),
        }
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        MaintenanceError::TableNotFound { name: name.into() }
    }

    pub fn view_not_found(name: impl Into<String>) -> Self {
        MaintenanceError::ViewNotFound { name: name.into() }
    }

    pub fn view_already_exists(name: impl Into<String>) -> Self {
        MaintenanceError::ViewAlreadyExists { name: name.into() }
    }

    pub fn view_not_populated(name: impl Into<String>) -> Self {
        MaintenanceError::ViewNotPopulated { name: name.into() }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        MaintenanceError::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn no_such_savepoint(name: impl Into<String>) -> Self {
        MaintenanceError::NoSuchSavepoint { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaintenanceError::direct_write_rejected("sales_summary");
        assert_eq!(
            err.to_string(),
            "cannot change view \"sales_summary\" directly"
        );

        let err = MaintenanceError::concurrent_maintenance("v");
        assert!(err.to_string().contains("concurrent transaction"));
    }

    #[test]
    fn test_constructor_helpers() {
        assert!(matches!(
            MaintenanceError::lock_unavailable("v"),
            MaintenanceError::LockUnavailable { .. }
        ));
        assert!(matches!(
            MaintenanceError::state_corruption("v", "negative multiplicity"),
            MaintenanceError::StateCorruption { .. }
        ));
    }
}
