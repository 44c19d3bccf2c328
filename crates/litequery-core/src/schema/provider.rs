//! Column information providers and table creation flags.

use std::ops::BitOr;

use super::{ColumnAttribute, IndexedAttribute, MemberDescriptor, TypeDescriptor};

/// Member name that becomes the primary key under [`CreateFlags::IMPLICIT_PK`].
pub const IMPLICIT_PK_NAME: &str = "Id";

/// Member name suffix that gets an index under [`CreateFlags::IMPLICIT_INDEX`].
pub const IMPLICIT_INDEX_SUFFIX: &str = "Id";

/// Flags controlling how a table mapping is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CreateFlags(u8);

impl CreateFlags {
    /// Only explicit annotations count.
    pub const NONE: Self = Self(0);
    /// A member named `Id` (any case) is the primary key.
    pub const IMPLICIT_PK: Self = Self(1);
    /// Members whose name ends in `Id` (any case) are indexed.
    pub const IMPLICIT_INDEX: Self = Self(2);
    /// Both implicit rules.
    pub const ALL_IMPLICIT: Self = Self(3);
    /// Primary keys are autoincrement.
    pub const AUTO_INC_PK: Self = Self(4);

    /// Returns whether every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CreateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Supplies the schema facts about each member.
///
/// The schema model never inspects annotations itself; it asks the provider.
/// Replace the provider to derive keys, indices or names from some other
/// source than [`ColumnAttribute`]s.
pub trait ColumnInfoProvider: Send + Sync {
    /// Table name for the type.
    fn table_name(&self, ty: &TypeDescriptor) -> String;

    /// Column name for the member.
    fn column_name(&self, member: &MemberDescriptor) -> String;

    /// Whether the member is left out of the table.
    fn is_ignored(&self, member: &MemberDescriptor) -> bool;

    /// Whether the member is (part of) the primary key.
    fn is_primary_key(&self, member: &MemberDescriptor) -> bool;

    /// Whether the member is an autoincrement key.
    fn is_auto_increment(&self, member: &MemberDescriptor) -> bool;

    /// Collation for the column, if any.
    fn collation(&self, member: &MemberDescriptor) -> Option<String>;

    /// Indices the member belongs to.
    fn indices(&self, member: &MemberDescriptor) -> Vec<IndexedAttribute>;

    /// Declared maximum text length, if any.
    fn max_length(&self, member: &MemberDescriptor) -> Option<u32>;

    /// Literal default value, if any.
    fn default_value(&self, member: &MemberDescriptor) -> Option<String>;

    /// Whether the column rejects nulls.
    fn is_not_null(&self, member: &MemberDescriptor) -> bool;
}

/// Provider reading the [`ColumnAttribute`]s attached to each member.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeColumnInfo;

impl AttributeColumnInfo {
    fn find<'a, T>(
        member: &'a MemberDescriptor,
        pick: impl Fn(&'a ColumnAttribute) -> Option<T>,
    ) -> Option<T> {
        member.attributes.iter().find_map(pick)
    }

    fn has(member: &MemberDescriptor, attribute: &ColumnAttribute) -> bool {
        member.attributes.contains(attribute)
    }
}

impl ColumnInfoProvider for AttributeColumnInfo {
    fn table_name(&self, ty: &TypeDescriptor) -> String {
        ty.table_name.clone().unwrap_or_else(|| ty.name.clone())
    }

    fn column_name(&self, member: &MemberDescriptor) -> String {
        Self::find(member, |a| match a {
            ColumnAttribute::Name(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| member.name.clone())
    }

    fn is_ignored(&self, member: &MemberDescriptor) -> bool {
        Self::has(member, &ColumnAttribute::Ignore)
    }

    fn is_primary_key(&self, member: &MemberDescriptor) -> bool {
        Self::has(member, &ColumnAttribute::PrimaryKey)
    }

    fn is_auto_increment(&self, member: &MemberDescriptor) -> bool {
        Self::has(member, &ColumnAttribute::AutoIncrement)
    }

    fn collation(&self, member: &MemberDescriptor) -> Option<String> {
        Self::find(member, |a| match a {
            ColumnAttribute::Collation(c) if !c.is_empty() => Some(c.clone()),
            _ => None,
        })
    }

    fn indices(&self, member: &MemberDescriptor) -> Vec<IndexedAttribute> {
        member
            .attributes
            .iter()
            .filter_map(|a| match a {
                ColumnAttribute::Indexed(index) => Some(index.clone()),
                _ => None,
            })
            .collect()
    }

    fn max_length(&self, member: &MemberDescriptor) -> Option<u32> {
        Self::find(member, |a| match a {
            ColumnAttribute::MaxLength(len) => Some(*len),
            _ => None,
        })
    }

    fn default_value(&self, member: &MemberDescriptor) -> Option<String> {
        Self::find(member, |a| match a {
            ColumnAttribute::Default(value) => Some(value.clone()),
            _ => None,
        })
    }

    fn is_not_null(&self, member: &MemberDescriptor) -> bool {
        Self::has(member, &ColumnAttribute::NotNull)
    }
}
