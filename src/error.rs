//! Catalog error taxonomy.

use thiserror::Error;

use crate::resources::{Id, ResourceKind};

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while resolving resources or maintaining snapshot windows.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} not found: id={id}")]
    NotFound { kind: ResourceKind, id: Id },

    #[error("Collection not found: name={0}")]
    CollectionNotFound(String),

    #[error("Out of order commit: id={id} is below window max {max_id}")]
    OutOfOrderCommit { id: Id, max_id: Id },

    #[error("Duplicate commit: id={id} is already in the window")]
    DuplicateCommit { id: Id },

    #[error("Snapshots holder for collection {collection_id} is shut down")]
    ShutdownRejected { collection_id: Id },

    #[error("Reference misuse: unref on {name} id={id} with zero references")]
    ReferenceMisuse { name: &'static str, id: Id },

    #[error("Invalid collection schema: {0}")]
    InvalidSchema(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Schema decode error: {0}")]
    SchemaDecode(#[from] serde_yaml::Error),
}

impl CatalogError {
    /// True when the error reports a missing record rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::NotFound { .. } | CatalogError::CollectionNotFound(_)
        )
    }

    /// True for window admission rejections (out of order, duplicate, shut down).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CatalogError::OutOfOrderCommit { .. }
                | CatalogError::DuplicateCommit { .. }
                | CatalogError::ShutdownRejected { .. }
        )
    }
}
