//! Error types for schema mapping and query compilation.

use thiserror::Error;

use crate::types::ValueKind;

/// Errors raised while mapping a type to a table or compiling a query.
///
/// These are contract violations in the calling code, not runtime
/// conditions: compilation either produces a complete statement or fails
/// before anything reaches the database.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A column's value kind has no storage class.
    #[error("don't know about {kind}")]
    UnsupportedType {
        /// The rejected kind.
        kind: ValueKind,
    },

    /// The expression shape cannot be compiled.
    #[error("cannot compile: {0}")]
    UnsupportedExpression(String),

    /// The binary operator has no SQL token.
    #[error("cannot get SQL operator name for: {0}")]
    UnsupportedOperator(String),

    /// The ordering key is not a plain member access.
    #[error("order by does not support: {0}")]
    UnsupportedOrderBy(String),

    /// The projection is not a single member access.
    #[error("select only supports a single member projection, got: {0}")]
    UnsupportedProjection(String),

    /// A builder operation expected a single-parameter lambda.
    #[error("must be a predicate: {0}")]
    NotAPredicate(String),

    /// The operation is permanently unsupported.
    #[error("{0} are not supported")]
    NotSupported(&'static str),

    /// A member was read off a null value.
    #[error("member access on a null value: {member}")]
    NullReference {
        /// The member that was being read.
        member: String,
    },

    /// A value could not be converted to the requested kind.
    #[error("cannot convert {value} to {target}")]
    Conversion {
        /// Debug rendering of the source value.
        value: String,
        /// The requested kind.
        target: String,
    },

    /// A member name has no column, or a captured record has no such field.
    #[error("unknown member: {0}")]
    UnknownMember(String),

    /// The value cannot be bound as a statement argument.
    #[error("value cannot be bound as a parameter: {0}")]
    UnsupportedValue(String),

    /// The table declaration violates a schema invariant.
    #[error("invalid schema for table {table}: {reason}")]
    InvalidSchema {
        /// Table being mapped.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The operation needs exactly one primary key column.
    #[error("table {0} has no single primary key")]
    MissingPrimaryKey(String),

    /// The number of key values does not fit the table's primary key.
    #[error("table {table} has {columns} primary key column(s), got {given} key value(s)")]
    KeyMismatch {
        /// Table being addressed.
        table: String,
        /// Number of primary key columns.
        columns: usize,
        /// Number of key values supplied.
        given: usize,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
