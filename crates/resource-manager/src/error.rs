//! # Errors
//!
//! Two error enums cover the crate. [`ConfigError`] is raised only while the
//! process is being set up (registry setters, manager type construction).
//! [`ManagerError`] is what an action pipeline returns to its caller.
//!
//! Validation and persistence failures are special: `create` and `delete`
//! catch them inside their atomic unit and report `Ok(false)` instead, leaving
//! the record's error list on the manager's target.

use crate::action::Action;

/// Invalid setup: an unknown or blank registry value, or a manager type that
/// selects an adapter it never supplied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown {setting} choice: {value:?}")]
    UnknownChoice { setting: &'static str, value: String },

    #[error("Blank value for {setting}")]
    Blank { setting: &'static str },

    #[error("No {category} adapter supplied for the selected configuration")]
    MissingAdapter { category: &'static str },

    #[error("Configuration parse error: {0}")]
    Parse(String),
}

/// Errors surfaced by an action pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Not authorized to {action} {entity}: {reason}")]
    AuthorizationDenied {
        action: Action,
        entity: String,
        reason: String,
    },

    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: String, id: String },

    #[error("{entity} validation failed: {}", errors.join(", "))]
    ValidationFailed { entity: String, errors: Vec<String> },

    #[error("{entity} persistence failed: {reason}")]
    PersistenceFailed { entity: String, reason: String },

    #[error("Action {action} is not enabled on {manager}")]
    ActionNotEnabled { manager: String, action: Action },

    #[error("{manager} has no entity type bound")]
    UnboundEntity { manager: String },

    #[error("Invalid {key} option: {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("Unknown scope {scope:?} on {entity}")]
    UnknownScope { entity: String, scope: String },

    #[error("No target available for {action}")]
    MissingTarget { action: Action },
}

impl ManagerError {
    /// True for the failures `create` and `delete` turn into `Ok(false)`.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            ManagerError::ValidationFailed { .. } | ManagerError::PersistenceFailed { .. }
        )
    }

    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, ManagerError::AuthorizationDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ManagerError::RecordNotFound { .. })
    }

    pub(crate) fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ManagerError::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
