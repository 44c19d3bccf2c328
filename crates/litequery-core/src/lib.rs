//! # litequery-core
//!
//! Schema mapping and query compilation for SQLite, with no I/O.
//!
//! This crate provides:
//! - Storage class resolution for Rust value kinds ([`types`])
//! - Table mappings derived from a type's structural description ([`schema`])
//! - Expression nodes for predicates, orderings and projections ([`expr`])
//! - A compiler from expressions to parameterized SQL ([`compiler`])
//! - Immutable, chainable query specifications ([`query`])
//!
//! ## Compiling a query
//!
//! ```rust
//! use std::sync::Arc;
//! use litequery_core::expr::{captured, field, lambda, null};
//! use litequery_core::schema::{
//!     AttributeColumnInfo, ColumnAttribute, CreateFlags, MemberDescriptor, TableMapping,
//!     TypeDescriptor,
//! };
//! use litequery_core::types::{TypeMapper, ValueKind};
//! use litequery_core::value::{SqlValue, Value};
//! use litequery_core::TableQuery;
//!
//! let ty = TypeDescriptor::new("Stock")
//!     .member(
//!         MemberDescriptor::new("Id", ValueKind::I64)
//!             .attribute(ColumnAttribute::PrimaryKey)
//!             .attribute(ColumnAttribute::AutoIncrement),
//!     )
//!     .member(MemberDescriptor::new("Symbol", ValueKind::Text));
//! let mapping =
//!     TableMapping::resolve(&ty, CreateFlags::NONE, &TypeMapper::new(), &AttributeColumnInfo)?;
//!
//! let ids = captured("ids", Value::list([1, 2]));
//! let stmt = TableQuery::new(Arc::new(mapping))
//!     .filter(lambda(ids.contains(field("Id")).and(field("Symbol").ne(null()))))?
//!     .take(10)
//!     .statement()?;
//!
//! assert_eq!(
//!     stmt.sql,
//!     "select * from \"Stock\" where ((\"Id\" in (?,?)) and (\"Symbol\" is not ?)) limit 10"
//! );
//! assert_eq!(
//!     stmt.args,
//!     vec![SqlValue::Integer(1), SqlValue::Integer(2), SqlValue::Null]
//! );
//! # Ok::<(), litequery_core::Error>(())
//! ```

pub mod compiler;
mod error;
pub mod expr;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

pub use compiler::{CompileResult, Compiler};
pub use error::{Error, Result};
pub use expr::Expr;
pub use query::{Statement, TableQuery};
pub use schema::{Storable, TableMapping};
pub use types::{TypeMapper, ValueKind};
pub use value::{SqlValue, ToValue, Value};
