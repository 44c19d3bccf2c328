//! Fluent query specifications.
//!
//! A [`TableQuery`] is an immutable description of a `select` over one
//! table. Every chain call returns a new value, so a query can be reused
//! as the base of several others.
//!
//! ```
//! # use std::sync::Arc;
//! # use litequery_core::schema::*;
//! # use litequery_core::types::{TypeMapper, ValueKind};
//! use litequery_core::expr::{field, lambda};
//! use litequery_core::query::TableQuery;
//!
//! # let ty = TypeDescriptor::new("T")
//! #     .member(MemberDescriptor::new("Name", ValueKind::Text))
//! #     .member(MemberDescriptor::new("Datum", ValueKind::I32));
//! # let mapping = TableMapping::resolve(&ty, CreateFlags::NONE, &TypeMapper::new(), &AttributeColumnInfo).unwrap();
//! let query = TableQuery::new(Arc::new(mapping))
//!     .filter(lambda(field("Name").starts_with("ab")))?
//!     .order_by_descending(&lambda(field("Datum")))?
//!     .skip(2);
//! let stmt = query.statement()?;
//! assert_eq!(
//!     stmt.sql,
//!     "select * from \"T\" where (\"Name\" like (? || '%')) order by \"Datum\" desc limit -1  offset 2"
//! );
//! # Ok::<(), litequery_core::Error>(())
//! ```

use std::sync::Arc;

use tracing::trace;

use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::expr::{Expr, UnaryOp};
use crate::schema::TableMapping;
use crate::value::SqlValue;

/// A SQL statement with its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Arguments, in placeholder order.
    pub args: Vec<SqlValue>,
}

/// One `order by` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    /// Quoted column name.
    pub column: String,
    /// Ascending or descending.
    pub ascending: bool,
}

impl Ordering {
    /// Returns the SQL representation.
    #[must_use]
    pub fn to_sql(&self) -> String {
        if self.ascending {
            self.column.clone()
        } else {
            format!("{} desc", self.column)
        }
    }
}

/// An immutable query over the rows of one table.
#[derive(Debug, Clone)]
pub struct TableQuery {
    mapping: Arc<TableMapping>,
    predicate: Option<Expr>,
    orderings: Vec<Ordering>,
    limit: Option<u64>,
    offset: Option<u64>,
    deferred: bool,
}

impl TableQuery {
    /// Creates a query returning every row of the mapped table.
    #[must_use]
    pub const fn new(mapping: Arc<TableMapping>) -> Self {
        Self {
            mapping,
            predicate: None,
            orderings: Vec::new(),
            limit: None,
            offset: None,
            deferred: false,
        }
    }

    /// The mapping of the queried table.
    #[must_use]
    pub fn mapping(&self) -> &Arc<TableMapping> {
        &self.mapping
    }

    /// The current predicate, without its lambda.
    #[must_use]
    pub const fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    /// The current orderings.
    #[must_use]
    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    /// The current limit.
    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// The current offset.
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Whether rows are materialized lazily.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Restricts the rows to those matching `predicate`.
    ///
    /// `predicate` must be a single-parameter lambda. It is combined with
    /// any existing predicate using `and`.
    pub fn filter(&self, predicate: Expr) -> Result<Self> {
        let body = match predicate {
            Expr::Lambda { arity: 1, body } => *body,
            other => return Err(Error::NotAPredicate(other.to_string())),
        };
        let mut query = self.clone();
        query.predicate = Some(match query.predicate.take() {
            Some(existing) => existing.and(body),
            None => body,
        });
        Ok(query)
    }

    /// Appends an ascending ordering on the selected member.
    pub fn order_by(&self, key: &Expr) -> Result<Self> {
        self.add_ordering(key, true)
    }

    /// Appends a descending ordering on the selected member.
    pub fn order_by_descending(&self, key: &Expr) -> Result<Self> {
        self.add_ordering(key, false)
    }

    fn add_ordering(&self, key: &Expr, ascending: bool) -> Result<Self> {
        let column = self.key_column(key).map_err(|err| match err {
            Error::UnsupportedExpression(_) => Error::UnsupportedOrderBy(key.to_string()),
            other => other,
        })?;
        let mut query = self.clone();
        query.orderings.push(Ordering { column, ascending });
        Ok(query)
    }

    /// Resolves `x => x.member` (optionally wrapped in a conversion) to a
    /// quoted column name.
    fn key_column(&self, key: &Expr) -> Result<String> {
        let unsupported = || Error::UnsupportedExpression(key.to_string());
        let Expr::Lambda { arity: 1, body } = key else {
            return Err(unsupported());
        };
        let member = match body.as_ref() {
            Expr::Unary {
                op: UnaryOp::Convert(_),
                operand,
            } => operand.as_ref(),
            other => other,
        };
        Compiler::new(&self.mapping)
            .column_name(member)
            .ok_or_else(unsupported)?
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn take(&self, n: u64) -> Self {
        let mut query = self.clone();
        query.limit = Some(n);
        query
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub fn skip(&self, n: u64) -> Self {
        let mut query = self.clone();
        query.offset = Some(n);
        query
    }

    /// Marks the query for lazy, row-by-row materialization.
    #[must_use]
    pub fn deferred(&self) -> Self {
        let mut query = self.clone();
        query.deferred = true;
        query
    }

    /// Joins are not supported and always fail.
    pub fn join(
        &self,
        _inner: &Self,
        _outer_key: &Expr,
        _inner_key: &Expr,
        _result: &Expr,
    ) -> Result<Self> {
        Err(Error::NotSupported("joins"))
    }

    /// Selects the row at `index`.
    #[must_use]
    pub fn element_at(&self, index: u64) -> Self {
        self.skip(index).take(1)
    }

    /// Selects the first row.
    #[must_use]
    pub fn first(&self) -> Self {
        self.take(1)
    }

    /// Builds the statement returning the matching rows.
    pub fn statement(&self) -> Result<Statement> {
        self.build("*")
    }

    /// Builds the statement counting the matching rows.
    pub fn count_statement(&self) -> Result<Statement> {
        self.build("count(*)")
    }

    /// Builds the statement counting the rows matching `predicate` as well.
    pub fn count_where(&self, predicate: Expr) -> Result<Statement> {
        self.filter(predicate)?.count_statement()
    }

    /// Builds the statement returning a single member of each row.
    ///
    /// Only `x => x.member` projections are supported.
    pub fn select(&self, projector: &Expr) -> Result<Statement> {
        let column = self.key_column(projector).map_err(|err| match err {
            Error::UnsupportedExpression(_) => Error::UnsupportedProjection(projector.to_string()),
            other => other,
        })?;
        self.build(&column)
    }

    fn build(&self, columns: &str) -> Result<Statement> {
        let mut sql = format!(
            "select {columns} from {}",
            self.mapping.quoted_table_name()
        );
        let mut args = Vec::new();

        if let Some(predicate) = &self.predicate {
            let compiled = Compiler::new(&self.mapping).compile(predicate, &mut args)?;
            sql.push_str(" where ");
            sql.push_str(&compiled.sql);
        }

        if !self.orderings.is_empty() {
            let parts: Vec<String> = self.orderings.iter().map(Ordering::to_sql).collect();
            sql.push_str(" order by ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }

        if let Some(offset) = self.offset {
            if self.limit.is_none() {
                sql.push_str(" limit -1 ");
            }
            sql.push_str(&format!(" offset {offset}"));
        }

        trace!(sql = %sql, args = args.len(), "built query");
        Ok(Statement { sql, args })
    }
}
