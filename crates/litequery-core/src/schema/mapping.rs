//! Resolved table mappings and the DDL they render.

use tracing::debug;

use super::provider::{ColumnInfoProvider, CreateFlags, IMPLICIT_INDEX_SUFFIX, IMPLICIT_PK_NAME};
use super::{IndexedAttribute, TypeDescriptor};
use crate::error::{Error, Result};
use crate::query::Statement;
use crate::types::{TypeMapper, ValueKind};
use crate::value::{SqlValue, Value};

/// One mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name in the table.
    pub name: String,
    /// Name of the member the column stores.
    pub property: String,
    /// Position of the member in the type description.
    pub member_index: usize,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Storage class used in the column declaration.
    pub sql_type: String,
    /// Whether the column accepts nulls.
    pub nullable: bool,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether the column is an autoincrement key.
    pub auto_increment: bool,
    /// Collation for comparisons.
    pub collation: Option<String>,
    /// Declared maximum text length.
    pub max_length: Option<u32>,
    /// Literal default value.
    pub default_value: Option<String>,
}

impl Column {
    /// Returns the column name in double quotes.
    #[must_use]
    pub fn quoted_name(&self) -> String {
        quote_identifier(&self.name)
    }

    /// Renders the column declaration used in `create table`.
    ///
    /// Clauses that do not apply leave an empty slot, so the line may
    /// contain repeated or trailing spaces.
    #[must_use]
    pub fn declaration(&self) -> String {
        let key = if self.auto_increment {
            "primary key autoincrement"
        } else {
            ""
        };
        let not_null = if self.nullable { "" } else { "not null" };
        let collate = self
            .collation
            .as_ref()
            .map(|c| format!("collate {c}"))
            .unwrap_or_default();
        let default = self
            .default_value
            .as_ref()
            .map(|d| format!("default('{}')", d.replace('\'', "''")))
            .unwrap_or_default();
        format!(
            "{} {} {key} {not_null} {collate} {default}",
            self.quoted_name(),
            self.sql_type
        )
    }
}

/// A declared index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed column names, in index order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    pub unique: bool,
}

/// The resolved schema of one storable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    type_name: String,
    table_name: String,
    columns: Vec<Column>,
    indices: Vec<Index>,
    datetime_as_ticks: bool,
}

impl TableMapping {
    /// Derives the mapping of a type.
    ///
    /// Only writable members that the provider does not ignore become
    /// columns. Fails if a member's kind has no storage class or the keys
    /// are declared inconsistently.
    pub fn resolve(
        ty: &TypeDescriptor,
        flags: CreateFlags,
        mapper: &TypeMapper,
        provider: &dyn ColumnInfoProvider,
    ) -> Result<Self> {
        let table_name = provider.table_name(ty);
        let invalid = |reason: String| Error::InvalidSchema {
            table: table_name.clone(),
            reason,
        };

        let mut columns = Vec::new();
        let mut declared_indices: Vec<(String, IndexedAttribute)> = Vec::new();
        for (member_index, member) in ty.members.iter().enumerate() {
            if !member.writable || provider.is_ignored(member) {
                continue;
            }
            let name = provider.column_name(member);
            let primary_key = provider.is_primary_key(member)
                || (flags.contains(CreateFlags::IMPLICIT_PK)
                    && member.name.eq_ignore_ascii_case(IMPLICIT_PK_NAME));
            let auto_increment = provider.is_auto_increment(member);
            if auto_increment && !primary_key {
                return Err(invalid(format!(
                    "autoincrement column {name} is not a primary key"
                )));
            }
            if auto_increment && !member.kind.is_integer() {
                return Err(invalid(format!(
                    "autoincrement column {name} is not an integer"
                )));
            }

            let mut indices = provider.indices(member);
            if indices.is_empty()
                && !primary_key
                && flags.contains(CreateFlags::IMPLICIT_INDEX)
                && ends_with_ignore_case(&member.name, IMPLICIT_INDEX_SUFFIX)
            {
                indices.push(IndexedAttribute::new());
            }
            declared_indices.extend(indices.into_iter().map(|i| (name.clone(), i)));

            let max_length = provider.max_length(member);
            let sql_type = mapper.storage_class(&member.kind, max_length)?;
            columns.push(Column {
                nullable: !(primary_key || provider.is_not_null(member)),
                property: member.name.clone(),
                member_index,
                kind: member.kind.clone(),
                sql_type,
                primary_key,
                auto_increment,
                collation: provider.collation(member),
                max_length,
                default_value: provider.default_value(member),
                name,
            });
        }

        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        let auto_count = columns.iter().filter(|c| c.auto_increment).count();
        if auto_count > 1 {
            return Err(invalid(String::from(
                "more than one autoincrement column",
            )));
        }
        if auto_count == 1 && pk_count > 1 {
            return Err(invalid(String::from(
                "autoincrement cannot be used with a composite primary key",
            )));
        }
        if flags.contains(CreateFlags::AUTO_INC_PK) && pk_count == 1 {
            if let Some(pk) = columns
                .iter_mut()
                .find(|c| c.primary_key && c.kind.is_integer())
            {
                pk.auto_increment = true;
            }
        }

        let indices = group_indices(&table_name, declared_indices).map_err(invalid)?;

        debug!(
            table = %table_name,
            columns = columns.len(),
            indices = indices.len(),
            "resolved table mapping"
        );

        Ok(Self {
            type_name: ty.name.clone(),
            table_name,
            columns,
            indices,
            datetime_as_ticks: mapper.datetime_as_ticks(),
        })
    }

    /// Name of the mapped Rust type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Declared indices.
    #[must_use]
    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    /// Whether date-times are bound as ticks rather than text.
    #[must_use]
    pub const fn datetime_as_ticks(&self) -> bool {
        self.datetime_as_ticks
    }

    /// Primary key columns.
    pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// The autoincrement column, if any.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// The single primary key column.
    pub fn pk(&self) -> Result<&Column> {
        let mut keys = self.primary_keys();
        match (keys.next(), keys.next()) {
            (Some(pk), None) => Ok(pk),
            _ => Err(Error::MissingPrimaryKey(self.table_name.clone())),
        }
    }

    /// Finds a column by column name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds the column storing `member`.
    pub fn find_column_with_property_name(&self, member: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.property == member)
            .ok_or_else(|| Error::UnknownMember(format!("{}.{member}", self.type_name)))
    }

    /// Returns the table name in double quotes.
    #[must_use]
    pub fn quoted_table_name(&self) -> String {
        quote_identifier(&self.table_name)
    }

    /// Renders `create table if not exists`.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(Column::declaration).collect();
        if self.auto_increment_column().is_none() {
            let keys: Vec<String> = self.primary_keys().map(Column::quoted_name).collect();
            if !keys.is_empty() {
                parts.push(format!("primary key ({})", keys.join(", ")));
            }
        }
        format!(
            "create table if not exists {} ({})",
            self.quoted_table_name(),
            parts.join(", ")
        )
    }

    /// Renders one `create index if not exists` per declared index.
    #[must_use]
    pub fn create_index_sql(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|index| {
                let columns: Vec<String> =
                    index.columns.iter().map(|c| quote_identifier(c)).collect();
                format!(
                    "create {}index if not exists {} on {} ({})",
                    if index.unique { "unique " } else { "" },
                    quote_identifier(&index.name),
                    self.quoted_table_name(),
                    columns.join(", ")
                )
            })
            .collect()
    }

    /// Builds the insert statement for one row.
    ///
    /// `values` are the row's member values in declaration order; the
    /// autoincrement column is left for the database to fill.
    pub fn insert_statement(&self, values: &[Value]) -> Result<Statement> {
        let columns: Vec<&Column> = self.columns.iter().filter(|c| !c.auto_increment).collect();
        let mut args = Vec::with_capacity(columns.len());
        for column in &columns {
            let value = values
                .get(column.member_index)
                .ok_or_else(|| Error::UnknownMember(column.property.clone()))?;
            args.push(self.bind(value)?);
        }
        let names: Vec<String> = columns.iter().map(|c| c.quoted_name()).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = if columns.is_empty() {
            format!("insert into {} default values", self.quoted_table_name())
        } else {
            format!(
                "insert into {} ({}) values ({placeholders})",
                self.quoted_table_name(),
                names.join(", ")
            )
        };
        Ok(Statement { sql, args })
    }

    /// Builds `select * ... where <pk> = ?`.
    pub fn get_statement(&self, pk: &Value) -> Result<Statement> {
        self.get_by_keys_statement(std::slice::from_ref(pk))
    }

    /// Builds `select * ... where "a" = ? and "b" = ?` for a complete,
    /// possibly composite, primary key given in column order.
    pub fn get_by_keys_statement(&self, keys: &[Value]) -> Result<Statement> {
        let columns = self.primary_keys().count();
        if columns > 0 && keys.len() != columns {
            return Err(self.key_mismatch(columns, keys.len()));
        }
        let (filter, args) = self.key_filter(keys)?;
        Ok(Statement {
            sql: format!("select * from {} where {filter}", self.quoted_table_name()),
            args,
        })
    }

    /// Builds `delete ... where <pk> = ?`.
    pub fn delete_statement(&self, pk: &Value) -> Result<Statement> {
        self.delete_by_keys_statement(std::slice::from_ref(pk))
    }

    /// Builds `delete ... where "a" = ? and ...` over the leading primary
    /// key columns, one per value in `keys`.
    ///
    /// A partial composite key deletes every row sharing that prefix.
    pub fn delete_by_keys_statement(&self, keys: &[Value]) -> Result<Statement> {
        let (filter, args) = self.key_filter(keys)?;
        Ok(Statement {
            sql: format!("delete from {} where {filter}", self.quoted_table_name()),
            args,
        })
    }

    fn key_filter(&self, keys: &[Value]) -> Result<(String, Vec<SqlValue>)> {
        let columns: Vec<&Column> = self.primary_keys().collect();
        if columns.is_empty() {
            return Err(Error::MissingPrimaryKey(self.table_name.clone()));
        }
        if keys.is_empty() || keys.len() > columns.len() {
            return Err(self.key_mismatch(columns.len(), keys.len()));
        }
        let filter = columns
            .iter()
            .take(keys.len())
            .map(|c| format!("{} = ?", c.quoted_name()))
            .collect::<Vec<_>>()
            .join(" and ");
        let args = keys.iter().map(|k| self.bind(k)).collect::<Result<Vec<_>>>()?;
        Ok((filter, args))
    }

    fn key_mismatch(&self, columns: usize, given: usize) -> Error {
        Error::KeyMismatch {
            table: self.table_name.clone(),
            columns,
            given,
        }
    }

    /// Builds `delete ... where <pk> in (?, ...)`.
    pub fn delete_in_statement(&self, keys: &[Value]) -> Result<Statement> {
        let key = self.pk()?;
        let args = keys.iter().map(|k| self.bind(k)).collect::<Result<Vec<_>>>()?;
        Ok(Statement {
            sql: format!(
                "delete from {} where {} in ({})",
                self.quoted_table_name(),
                key.quoted_name(),
                vec!["?"; keys.len()].join(",")
            ),
            args,
        })
    }

    /// Builds `delete from <table>`.
    #[must_use]
    pub fn delete_all_statement(&self) -> Statement {
        Statement {
            sql: format!("delete from {}", self.quoted_table_name()),
            args: Vec::new(),
        }
    }

    /// Reduces a value to an argument using this table's storage settings.
    pub fn bind(&self, value: &Value) -> Result<SqlValue> {
        value.to_sql_value(self.datetime_as_ticks)
    }
}

fn group_indices(
    table: &str,
    declared: Vec<(String, IndexedAttribute)>,
) -> std::result::Result<Vec<Index>, String> {
    let mut grouped: Vec<(String, bool, Vec<(i32, String)>)> = Vec::new();
    for (column, attr) in declared {
        let name = attr
            .name
            .clone()
            .unwrap_or_else(|| format!("{table}_{column}"));
        match grouped.iter_mut().find(|(n, _, _)| *n == name) {
            Some((_, unique, members)) => {
                if *unique != attr.unique {
                    return Err(format!(
                        "all the columns in index {name} must have the same uniqueness"
                    ));
                }
                members.push((attr.order, column));
            }
            None => grouped.push((name, attr.unique, vec![(attr.order, column)])),
        }
    }
    Ok(grouped
        .into_iter()
        .map(|(name, unique, mut members)| {
            members.sort_by_key(|(order, _)| *order);
            Index {
                name,
                columns: members.into_iter().map(|(_, c)| c).collect(),
                unique,
            }
        })
        .collect())
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Wraps an identifier in double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
