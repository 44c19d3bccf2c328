//! Connections and their options.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use litequery_core::schema::{
    AttributeColumnInfo, ColumnInfoProvider, CreateFlags, MappingCache, Storable,
};
use litequery_core::types::BlobSerializer;
use litequery_core::{Statement, TableMapping, ToValue, TypeMapper, Value, ValueKind};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::FromRow;
use tracing::debug;

use crate::bind::{bind_param, bind_param_raw};
use crate::error::{OrmError, Result};
use crate::table::Table;

/// Options applied to every table a connection maps.
#[derive(Clone)]
pub struct ConnectionOptions {
    store_datetime_as_ticks: bool,
    extra_types: Vec<(ValueKind, String)>,
    serializer: Option<Arc<dyn BlobSerializer>>,
    column_info: Arc<dyn ColumnInfoProvider>,
    create_flags: CreateFlags,
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("store_datetime_as_ticks", &self.store_datetime_as_ticks)
            .field("extra_types", &self.extra_types)
            .field("serializer", &self.serializer.is_some())
            .field("create_flags", &self.create_flags)
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            store_datetime_as_ticks: false,
            extra_types: Vec::new(),
            serializer: None,
            column_info: Arc::new(AttributeColumnInfo),
            create_flags: CreateFlags::NONE,
        }
    }
}

impl ConnectionOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether date-times are stored as integer ticks or as text (the
    /// default).
    ///
    /// Tick columns are read back through [`DateTimeTicks`].
    ///
    /// [`DateTimeTicks`]: crate::DateTimeTicks
    #[must_use]
    pub fn store_datetime_as_ticks(mut self, value: bool) -> Self {
        self.store_datetime_as_ticks = value;
        self
    }

    /// Maps a custom kind to a storage class.
    #[must_use]
    pub fn extra_type_mapping(mut self, kind: ValueKind, storage_class: impl Into<String>) -> Self {
        self.extra_types.push((kind, storage_class.into()));
        self
    }

    /// Installs a serializer storing custom kinds as blobs.
    #[must_use]
    pub fn blob_serializer(mut self, serializer: Arc<dyn BlobSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Replaces the column information provider.
    #[must_use]
    pub fn column_info_provider(mut self, provider: Arc<dyn ColumnInfoProvider>) -> Self {
        self.column_info = provider;
        self
    }

    /// Sets the flags used when mapping tables.
    #[must_use]
    pub fn create_flags(mut self, flags: CreateFlags) -> Self {
        self.create_flags = flags;
        self
    }

    fn type_mapper(&self) -> TypeMapper {
        let mut mapper = TypeMapper::new().store_datetime_as_ticks(self.store_datetime_as_ticks);
        for (kind, class) in &self.extra_types {
            mapper = mapper.extra_type(kind.clone(), class.clone());
        }
        if let Some(serializer) = &self.serializer {
            mapper = mapper.serializer(Arc::clone(serializer));
        }
        mapper
    }
}

/// A connection to one SQLite database.
///
/// The underlying pool holds a single connection, so statements run one at
/// a time. Table mappings are resolved once per type and cached.
pub struct Connection {
    pool: SqlitePool,
    mapper: TypeMapper,
    column_info: Arc<dyn ColumnInfoProvider>,
    create_flags: CreateFlags,
    mappings: MappingCache,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pool", &self.pool)
            .field("mapper", &self.mapper)
            .field("create_flags", &self.create_flags)
            .field("mappings", &self.mappings.len())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens the database at `url` with default options.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://app.db` or `:memory:`.
    pub async fn open(url: &str) -> Result<Self> {
        Self::open_with(url, ConnectionOptions::default()).await
    }

    /// Opens the database at `url`.
    pub async fn open_with(url: &str, options: ConnectionOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await?;
        debug!(url, "opened connection");
        Ok(Self::from_pool(pool, options))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool, options: ConnectionOptions) -> Self {
        Self {
            mapper: options.type_mapper(),
            column_info: options.column_info,
            create_flags: options.create_flags,
            mappings: MappingCache::new(),
            pool,
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the mapping of `T`, resolving it on first use.
    pub fn mapping<T: Storable>(&self) -> Result<Arc<TableMapping>> {
        Ok(self
            .mappings
            .get_or_resolve::<T>(self.create_flags, &self.mapper, self.column_info.as_ref())?)
    }

    /// Creates the table of `T` and its indices if they do not exist.
    pub async fn create_table<T: Storable>(&self) -> Result<()> {
        let mapping = self.mapping::<T>()?;
        let create = mapping.create_table_sql();
        debug!(table = mapping.table_name(), sql = %create, "creating table");
        sqlx::query(&create).execute(&self.pool).await?;
        for sql in mapping.create_index_sql() {
            debug!(table = mapping.table_name(), sql = %sql, "creating index");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Starts a query over the rows of `T`.
    pub fn table<T: Storable>(&self) -> Result<Table<'_, T>> {
        Ok(Table::new(self, self.mapping::<T>()?))
    }

    /// Runs a statement and returns the number of affected rows.
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, args = statement.args.len(), "executing statement");
        let mut query = sqlx::query(&statement.sql);
        for arg in statement.args.iter().cloned() {
            query = bind_param_raw(query, arg);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    /// Inserts one row and returns its rowid.
    ///
    /// The autoincrement column, if any, is filled by the database.
    pub async fn insert<T: Storable>(&self, row: &T) -> Result<i64> {
        let statement = self.mapping::<T>()?.insert_statement(&row.to_values())?;
        debug!(sql = %statement.sql, "inserting row");
        let mut query = sqlx::query(&statement.sql);
        for arg in statement.args {
            query = bind_param_raw(query, arg);
        }
        Ok(query.execute(&self.pool).await?.last_insert_rowid())
    }

    /// Inserts all rows in one transaction and returns how many were
    /// inserted.
    pub async fn insert_all<'a, T, I>(&self, rows: I) -> Result<u64>
    where
        T: Storable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mapping = self.mapping::<T>()?;
        let statements = rows
            .into_iter()
            .map(|row| mapping.insert_statement(&row.to_values()))
            .collect::<litequery_core::Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for statement in statements {
            let mut query = sqlx::query(&statement.sql);
            for arg in statement.args {
                query = bind_param_raw(query, arg);
            }
            inserted += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        debug!(table = mapping.table_name(), inserted, "inserted rows");
        Ok(inserted)
    }

    /// Gets the row with primary key `pk`.
    ///
    /// Returns [`OrmError::NotFound`] if there is no such row.
    pub async fn get<T>(&self, pk: impl ToValue) -> Result<T>
    where
        T: Storable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.find(pk).await?.ok_or(OrmError::NotFound)
    }

    /// Gets the row with primary key `pk`, if it exists.
    pub async fn find<T>(&self, pk: impl ToValue) -> Result<Option<T>>
    where
        T: Storable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.find_by_keys(&[pk.to_value()]).await
    }

    /// Gets the row whose composite primary key is `keys`, in column order.
    ///
    /// Returns [`OrmError::NotFound`] if there is no such row.
    pub async fn get_by_keys<T>(&self, keys: &[Value]) -> Result<T>
    where
        T: Storable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        self.find_by_keys(keys).await?.ok_or(OrmError::NotFound)
    }

    /// Gets the row whose composite primary key is `keys`, if it exists.
    pub async fn find_by_keys<T>(&self, keys: &[Value]) -> Result<Option<T>>
    where
        T: Storable + for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let statement = self.mapping::<T>()?.get_by_keys_statement(keys)?;
        let mut query = sqlx::query_as::<_, T>(&statement.sql);
        for arg in statement.args {
            query = bind_param(query, arg);
        }
        Ok(query.fetch_optional(&self.pool).await?)
    }

    /// Deletes the row with primary key `pk` and returns the number of
    /// deleted rows.
    pub async fn delete<T: Storable>(&self, pk: impl ToValue) -> Result<u64> {
        self.delete_by_keys::<T>(&[pk.to_value()]).await
    }

    /// Deletes by the leading columns of a composite primary key.
    ///
    /// A full key deletes at most one row; a partial key deletes every row
    /// that shares it.
    pub async fn delete_by_keys<T: Storable>(&self, keys: &[Value]) -> Result<u64> {
        let statement = self.mapping::<T>()?.delete_by_keys_statement(keys)?;
        self.execute(&statement).await
    }

    /// Deletes the rows whose primary key is one of `pks`.
    pub async fn delete_in<T: Storable>(&self, pks: &[Value]) -> Result<u64> {
        if pks.is_empty() {
            return Ok(0);
        }
        let statement = self.mapping::<T>()?.delete_in_statement(pks)?;
        self.execute(&statement).await
    }

    /// Deletes every row of `T`.
    pub async fn delete_all<T: Storable>(&self) -> Result<u64> {
        let statement = self.mapping::<T>()?.delete_all_statement();
        self.execute(&statement).await
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litequery_core::schema::{ColumnAttribute, MemberDescriptor, TypeDescriptor};
    use litequery_core::SqlValue;

    struct Event {
        id: i64,
        at: chrono::NaiveDateTime,
    }

    impl Storable for Event {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::new("Event")
                .member(
                    MemberDescriptor::new("id", ValueKind::I64)
                        .attribute(ColumnAttribute::PrimaryKey),
                )
                .member(MemberDescriptor::new("at", ValueKind::DateTime))
        }

        fn to_values(&self) -> Vec<Value> {
            vec![self.id.to_value(), self.at.to_value()]
        }
    }

    fn noon() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_options_build_type_mapper() {
        let mapper = ConnectionOptions::new()
            .extra_type_mapping(ValueKind::Custom(String::from("Point")), "text")
            .type_mapper();
        assert!(!mapper.datetime_as_ticks());
        assert_eq!(
            mapper
                .storage_class(&ValueKind::Custom(String::from("Point")), None)
                .unwrap(),
            "text"
        );

        assert_eq!(
            mapper.storage_class(&ValueKind::DateTime, None).unwrap(),
            "datetime"
        );

        let ticks = ConnectionOptions::new()
            .store_datetime_as_ticks(true)
            .type_mapper();
        assert_eq!(
            ticks.storage_class(&ValueKind::DateTime, None).unwrap(),
            "integer"
        );
    }

    #[tokio::test]
    async fn test_datetime_stored_as_ticks() {
        let options = ConnectionOptions::new().store_datetime_as_ticks(true);
        let conn = Connection::open_with(":memory:", options).await.unwrap();
        conn.create_table::<Event>().await.unwrap();
        conn.insert(&Event { id: 1, at: noon() }).await.unwrap();

        let stored: i64 = sqlx::query_scalar("select at from Event where id = 1")
            .fetch_one(conn.pool())
            .await
            .unwrap();
        assert_eq!(
            SqlValue::Integer(stored),
            noon().to_value().to_sql_value(true).unwrap()
        );
    }

    #[tokio::test]
    async fn test_datetime_stored_as_text() {
        let conn = Connection::open(":memory:").await.unwrap();
        conn.create_table::<Event>().await.unwrap();
        conn.insert(&Event { id: 1, at: noon() }).await.unwrap();

        let stored: String = sqlx::query_scalar("select at from Event where id = 1")
            .fetch_one(conn.pool())
            .await
            .unwrap();
        assert_eq!(stored, "2024-01-02 12:00:00.000");
    }

    #[tokio::test]
    async fn test_mapping_is_cached() {
        let conn = Connection::open(":memory:").await.unwrap();
        let first = conn.mapping::<Event>().unwrap();
        let second = conn.mapping::<Event>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.pk().unwrap().name, "id");
    }
}
