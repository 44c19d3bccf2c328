//! Schema model: how a Rust type is laid out as a table.
//!
//! A type describes its storable members through [`Storable`] (usually
//! derived with `#[derive(Storable)]`). The description is turned into a
//! [`TableMapping`] once per connection, with a [`ColumnInfoProvider`]
//! deciding which members are keys, indexed, collated and so on.

mod cache;
mod mapping;
mod provider;

pub use cache::MappingCache;
pub use mapping::{Column, Index, TableMapping};
pub use provider::{
    AttributeColumnInfo, ColumnInfoProvider, CreateFlags, IMPLICIT_INDEX_SUFFIX, IMPLICIT_PK_NAME,
};

use crate::types::ValueKind;
use crate::value::Value;

/// Trait for types that can be stored as table rows.
///
/// Implemented by `#[derive(Storable)]`.
pub trait Storable: 'static {
    /// Returns the structural description of the type.
    fn descriptor() -> TypeDescriptor;

    /// Returns the value of every described member, in declaration order.
    fn to_values(&self) -> Vec<Value>;

    /// Returns the instance as a record, for use as a captured value.
    fn to_record(&self) -> Value {
        let descriptor = Self::descriptor();
        Value::record(
            descriptor
                .members
                .into_iter()
                .map(|m| m.name)
                .zip(self.to_values()),
        )
    }
}

/// Structural description of a storable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Rust type name.
    pub name: String,
    /// Explicit table name, if the type declares one.
    pub table_name: Option<String>,
    /// Members in declaration order.
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    /// Creates a description with no members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            members: Vec::new(),
        }
    }

    /// Sets the explicit table name.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Appends a member.
    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }
}

/// One member of a storable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    /// Member (field) name.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Whether the member can be written back when hydrating a row.
    pub writable: bool,
    /// Annotations attached to the member.
    pub attributes: Vec<ColumnAttribute>,
}

impl MemberDescriptor {
    /// Creates a writable member with no annotations.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            writable: true,
            attributes: Vec::new(),
        }
    }

    /// Marks the member as read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Attaches an annotation.
    #[must_use]
    pub fn attribute(mut self, attribute: ColumnAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Annotation attached to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAttribute {
    /// Overrides the column name.
    Name(String),
    /// The member is not stored.
    Ignore,
    /// The member is (part of) the primary key.
    PrimaryKey,
    /// The member is an autoincrement key.
    AutoIncrement,
    /// Collation used for comparisons.
    Collation(String),
    /// Declared maximum text length.
    MaxLength(u32),
    /// Literal default value.
    Default(String),
    /// The column rejects nulls.
    NotNull,
    /// Membership in an index.
    Indexed(IndexedAttribute),
}

/// Declares that a member belongs to an index.
///
/// Members sharing an index name form a composite index, ordered by `order`.
/// An unnamed index gets the name `<table>_<column>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedAttribute {
    /// Index name.
    pub name: Option<String>,
    /// Position within a composite index.
    pub order: i32,
    /// Whether the index is unique.
    pub unique: bool,
}

impl IndexedAttribute {
    /// Creates an unnamed, non-unique index declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a named index declaration.
    #[must_use]
    pub fn named(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: Some(name.into()),
            order,
            unique: false,
        }
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
