//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The query could not be mapped or compiled.
    #[error("query error: {0}")]
    Query(#[from] litequery_core::Error),

    /// No object found matching the query.
    #[error("object not found")]
    NotFound,
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
