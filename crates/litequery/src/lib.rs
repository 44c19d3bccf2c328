//! # litequery
//!
//! Typed table queries over SQLite without hand-written SQL.
//!
//! This crate provides:
//! - `#[derive(Storable)]` to describe a struct as a table
//! - [`Connection`], which creates tables and runs statements through sqlx
//! - [`Table`], a chainable query handle compiled by `litequery-core`
//! - [`DateTimeTicks`] and [`DurationTicks`] for reading tick columns
//!
//! ## Quick Start
//!
//! ```ignore
//! use litequery::expr::{captured, field, lambda};
//! use litequery::{Connection, Storable, Value};
//!
//! #[derive(Debug, Storable, sqlx::FromRow)]
//! struct Stock {
//!     #[column(primary_key, autoincrement)]
//!     id: i64,
//!     #[column(max_length = 8, indexed)]
//!     symbol: String,
//! }
//!
//! async fn example() -> litequery::Result<()> {
//!     let conn = Connection::open(":memory:").await?;
//!     conn.create_table::<Stock>().await?;
//!     conn.insert(&Stock { id: 0, symbol: "ACME".into() }).await?;
//!
//!     let wanted = captured("wanted", Value::list(["ACME", "INIT"]));
//!     let stocks = conn
//!         .table::<Stock>()?
//!         .filter(lambda(wanted.contains(field("symbol"))))?
//!         .to_vec()
//!         .await?;
//!     assert_eq!(stocks.len(), 1);
//!     Ok(())
//! }
//! ```

mod bind;
mod connection;
mod error;
mod table;
mod ticks;

pub use connection::{Connection, ConnectionOptions};
pub use error::{OrmError, Result};
pub use table::{Compiled, Projection, Table};
pub use ticks::{DateTimeTicks, DurationTicks};

// Re-export commonly used items from litequery-core
pub use litequery_core::schema::{CreateFlags, Storable};
pub use litequery_core::{expr, schema, types, value};
pub use litequery_core::{Expr, SqlValue, Statement, TableQuery, ToValue, Value, ValueKind};
pub use litequery_derive::Storable;
