//! Typed query handles that execute against a connection.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use litequery_core::schema::Storable;
use litequery_core::{Expr, Statement, TableMapping, TableQuery};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, FromRow, Sqlite, Type};
use tracing::debug;

use crate::bind::{bind_param, bind_param_scalar};
use crate::connection::Connection;
use crate::error::{OrmError, Result};

/// A query over the rows of `T`, bound to a connection.
///
/// Chain calls return new handles and leave the original untouched; the
/// query runs when a terminal method is awaited.
///
/// # Example
///
/// ```ignore
/// use litequery::expr::{field, lambda};
///
/// let names = conn
///     .table::<Stock>()?
///     .filter(lambda(field("symbol").starts_with("A")))?
///     .order_by(&lambda(field("symbol")))?
///     .to_vec()
///     .await?;
/// ```
pub struct Table<'c, T> {
    conn: &'c Connection,
    query: TableQuery,
    _marker: PhantomData<fn() -> T>,
}

// Manual Clone implementation to avoid T: Clone bound
impl<T> Clone for Table<'_, T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            query: self.query.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Table<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("query", &self.query).finish()
    }
}

impl<'c, T: Storable> Table<'c, T> {
    pub(crate) const fn new(conn: &'c Connection, mapping: Arc<TableMapping>) -> Self {
        Self {
            conn,
            query: TableQuery::new(mapping),
            _marker: PhantomData,
        }
    }

    fn with(&self, query: TableQuery) -> Self {
        Self {
            conn: self.conn,
            query,
            _marker: PhantomData,
        }
    }

    /// The underlying query specification.
    #[must_use]
    pub const fn query(&self) -> &TableQuery {
        &self.query
    }

    /// Restricts the rows to those matching `predicate`.
    pub fn filter(&self, predicate: Expr) -> Result<Self> {
        Ok(self.with(self.query.filter(predicate)?))
    }

    /// Orders the rows by the selected member, ascending.
    pub fn order_by(&self, key: &Expr) -> Result<Self> {
        Ok(self.with(self.query.order_by(key)?))
    }

    /// Orders the rows by the selected member, descending.
    pub fn order_by_descending(&self, key: &Expr) -> Result<Self> {
        Ok(self.with(self.query.order_by_descending(key)?))
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn take(&self, n: u64) -> Self {
        self.with(self.query.take(n))
    }

    /// Skips the first `n` rows.
    #[must_use]
    pub fn skip(&self, n: u64) -> Self {
        self.with(self.query.skip(n))
    }

    /// Makes [`Compiled::rows`] pull rows one at a time.
    #[must_use]
    pub fn deferred(&self) -> Self {
        self.with(self.query.deferred())
    }

    /// Joins are not supported and always fail.
    pub fn join<U: Storable>(
        &self,
        inner: &Table<'c, U>,
        outer_key: &Expr,
        inner_key: &Expr,
        result: &Expr,
    ) -> Result<Self> {
        Ok(self.with(
            self.query
                .join(&inner.query, outer_key, inner_key, result)?,
        ))
    }

    /// Compiles the query.
    pub fn compile(&self) -> Result<Compiled<'c, T>> {
        Ok(Compiled {
            conn: self.conn,
            statement: self.query.statement()?,
            deferred: self.query.is_deferred(),
            _marker: PhantomData,
        })
    }

    /// Compiles a single-member projection.
    pub fn select<R>(&self, projector: &Expr) -> Result<Projection<'c, R>> {
        Ok(Projection {
            conn: self.conn,
            statement: self.query.select(projector)?,
            deferred: self.query.is_deferred(),
            _marker: PhantomData,
        })
    }

    /// Counts the matching rows.
    pub async fn count(&self) -> Result<i64> {
        count(self.conn, self.query.count_statement()?).await
    }

    /// Counts the rows matching both the query and `predicate`.
    pub async fn count_where(&self, predicate: Expr) -> Result<i64> {
        count(self.conn, self.query.count_where(predicate)?).await
    }
}

impl<'c, T> Table<'c, T>
where
    T: Storable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    /// Runs the query and collects every row.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        self.compile()?.to_vec().await
    }

    /// Returns the first row, or [`OrmError::NotFound`].
    pub async fn first(&self) -> Result<T> {
        self.first_or_default().await?.ok_or(OrmError::NotFound)
    }

    /// Returns the first row, if any.
    pub async fn first_or_default(&self) -> Result<Option<T>> {
        Ok(self.with(self.query.first()).to_vec().await?.into_iter().next())
    }

    /// Returns the row at `index`, or [`OrmError::NotFound`].
    pub async fn element_at(&self, index: u64) -> Result<T> {
        self.with(self.query.element_at(index))
            .to_vec()
            .await?
            .into_iter()
            .next()
            .ok_or(OrmError::NotFound)
    }
}

async fn count(conn: &Connection, statement: Statement) -> Result<i64> {
    debug!(sql = %statement.sql, "counting rows");
    let mut query = sqlx::query_scalar::<_, i64>(&statement.sql);
    for arg in statement.args {
        query = bind_param_scalar(query, arg);
    }
    Ok(query.fetch_one(conn.pool()).await?)
}

/// A compiled query returning rows of `T`.
pub struct Compiled<'c, T> {
    conn: &'c Connection,
    statement: Statement,
    deferred: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Compiled<'_, T> {
    /// The compiled statement.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }
}

impl<T> Compiled<'_, T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    /// Runs the statement and collects every row.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        debug!(sql = %self.statement.sql, args = self.statement.args.len(), "fetching rows");
        let mut query = sqlx::query_as::<_, T>(&self.statement.sql);
        for arg in self.statement.args.iter().cloned() {
            query = bind_param(query, arg);
        }
        Ok(query.fetch_all(self.conn.pool()).await?)
    }

    /// Streams the rows.
    ///
    /// A deferred query decodes one row per poll from an open cursor;
    /// dropping the stream releases the cursor. Otherwise every row is
    /// fetched on the first poll.
    pub fn rows(&self) -> BoxStream<'_, Result<T>> {
        debug!(
            sql = %self.statement.sql,
            deferred = self.deferred,
            "streaming rows"
        );
        let mut query = sqlx::query_as::<_, T>(&self.statement.sql);
        for arg in self.statement.args.iter().cloned() {
            query = bind_param(query, arg);
        }
        let pool = self.conn.pool();
        if self.deferred {
            query.fetch(pool).map_err(OrmError::from).boxed()
        } else {
            stream::once(query.fetch_all(pool))
                .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<T, OrmError>)))
                .map_err(OrmError::from)
                .try_flatten()
                .boxed()
        }
    }
}

/// A compiled single-member projection returning values of `R`.
pub struct Projection<'c, R> {
    conn: &'c Connection,
    statement: Statement,
    deferred: bool,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Projection<'_, R> {
    /// The compiled statement.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }
}

impl<R> Projection<'_, R>
where
    R: for<'r> Decode<'r, Sqlite> + Type<Sqlite> + Send + Unpin,
{
    /// Runs the statement and collects every value.
    pub async fn to_vec(&self) -> Result<Vec<R>> {
        debug!(sql = %self.statement.sql, "fetching projection");
        let mut query = sqlx::query_scalar::<_, R>(&self.statement.sql);
        for arg in self.statement.args.iter().cloned() {
            query = bind_param_scalar(query, arg);
        }
        Ok(query.fetch_all(self.conn.pool()).await?)
    }

    /// Streams the values, one per poll when the query is deferred.
    pub fn rows(&self) -> BoxStream<'_, Result<R>> {
        let mut query = sqlx::query_scalar::<_, R>(&self.statement.sql);
        for arg in self.statement.args.iter().cloned() {
            query = bind_param_scalar(query, arg);
        }
        let pool = self.conn.pool();
        if self.deferred {
            query.fetch(pool).map_err(OrmError::from).boxed()
        } else {
            stream::once(query.fetch_all(pool))
                .map_ok(|values| stream::iter(values.into_iter().map(Ok::<R, OrmError>)))
                .map_err(OrmError::from)
                .try_flatten()
                .boxed()
        }
    }
}
