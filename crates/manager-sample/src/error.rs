use resource_manager::{ConfigError, ManagerError};

/// Errors surfaced by [`CatalogSystem`](crate::lifecycle::CatalogSystem).
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A write came back `false`; `errors` are the record's messages.
    #[error("{entity} rejected: {}", errors.join(", "))]
    Rejected {
        entity: &'static str,
        errors: Vec<String>,
    },

    #[error("{entity} record has no usable {field}")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
}

impl SampleError {
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, SampleError::Manager(e) if e.is_authorization_denied())
    }
}
