//! Domain-level error types.

use std::fmt::Display;

use thiserror::Error;

/// Domain errors - the outcomes callers of the core can observe.
///
/// Cache misses and cache faults never surface here; they fall back to the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Conflicting data: {0}")]
    Conflict(String),

    #[error("Forbidden: caller does not own this resource")]
    Forbidden,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("No data to update")]
    NoChange,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity_type: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Translate a store failure for the entity identified by `id`.
    ///
    /// Not-found and constraint violations keep their meaning, anything
    /// else becomes `Internal`.
    pub fn from_repo(err: RepoError, entity_type: &'static str, id: impl Display) -> Self {
        match err {
            RepoError::NotFound => Self::not_found(entity_type, id),
            RepoError::Constraint(msg) => Self::Conflict(msg),
            RepoError::Connection(msg) | RepoError::Query(msg) => {
                tracing::error!(entity = entity_type, error = %msg, "Store operation failed");
                Self::Internal(msg)
            }
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}
