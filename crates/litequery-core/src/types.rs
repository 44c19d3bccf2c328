//! Mapping from Rust value kinds to SQLite storage classes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Maximum text length declared for text columns without an explicit one.
pub const DEFAULT_MAX_STRING_LENGTH: u32 = 140;

/// The declared kind of a stored member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// Fixed-point decimal.
    Decimal,
    /// UTF-8 text.
    Text,
    /// Rich text document stored as markup.
    Document,
    /// Time span, stored as ticks.
    Duration,
    /// Date and time.
    DateTime,
    /// C-like enum, stored by ordinal.
    Enum,
    /// Raw bytes.
    Blob,
    /// 128-bit unique identifier.
    Uuid,
    /// Any other type, identified by its type name.
    Custom(String),
}

impl ValueKind {
    /// Returns whether values of this kind are stored as plain integers.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    /// Returns whether values of this kind are text.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Document)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Decimal => write!(f, "decimal"),
            Self::Text => write!(f, "text"),
            Self::Document => write!(f, "document"),
            Self::Duration => write!(f, "duration"),
            Self::DateTime => write!(f, "datetime"),
            Self::Enum => write!(f, "enum"),
            Self::Blob => write!(f, "blob"),
            Self::Uuid => write!(f, "uuid"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A serializer able to store custom kinds as blobs.
pub trait BlobSerializer: Send + Sync {
    /// Returns whether values of `kind` can be read back from a blob.
    fn can_deserialize(&self, kind: &ValueKind) -> bool;
}

/// Resolves the storage class of a column.
///
/// The checks run in a fixed order and the first match wins; a kind that
/// matches nothing is rejected with [`Error::UnsupportedType`].
#[derive(Clone, Default)]
pub struct TypeMapper {
    store_datetime_as_ticks: bool,
    extra_types: HashMap<ValueKind, String>,
    serializer: Option<Arc<dyn BlobSerializer>>,
}

impl fmt::Debug for TypeMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMapper")
            .field("store_datetime_as_ticks", &self.store_datetime_as_ticks)
            .field("extra_types", &self.extra_types)
            .field("serializer", &self.serializer.is_some())
            .finish()
    }
}

impl TypeMapper {
    /// Creates a mapper storing date-times as text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether date-times are stored as integer ticks.
    #[must_use]
    pub fn store_datetime_as_ticks(mut self, value: bool) -> Self {
        self.store_datetime_as_ticks = value;
        self
    }

    /// Registers a storage class override for a kind.
    #[must_use]
    pub fn extra_type(mut self, kind: ValueKind, storage_class: impl Into<String>) -> Self {
        self.extra_types.insert(kind, storage_class.into());
        self
    }

    /// Installs the serializer used as the last fallback for custom kinds.
    #[must_use]
    pub fn serializer(mut self, serializer: Arc<dyn BlobSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Returns whether date-times are stored as ticks.
    #[must_use]
    pub const fn datetime_as_ticks(&self) -> bool {
        self.store_datetime_as_ticks
    }

    /// Returns the storage class for `kind`.
    ///
    /// `max_length` only affects text columns and defaults to
    /// [`DEFAULT_MAX_STRING_LENGTH`].
    pub fn storage_class(&self, kind: &ValueKind, max_length: Option<u32>) -> Result<String> {
        let class = match kind {
            ValueKind::Bool
            | ValueKind::I8
            | ValueKind::I16
            | ValueKind::I32
            | ValueKind::I64
            | ValueKind::U8
            | ValueKind::U16
            | ValueKind::U32
            | ValueKind::U64
            | ValueKind::Duration
            | ValueKind::Enum => String::from("integer"),
            ValueKind::F32 | ValueKind::F64 | ValueKind::Decimal => String::from("float"),
            ValueKind::Document => String::from("text"),
            ValueKind::Text => {
                format!("text({})", max_length.unwrap_or(DEFAULT_MAX_STRING_LENGTH))
            }
            ValueKind::DateTime => {
                if self.store_datetime_as_ticks {
                    String::from("integer")
                } else {
                    String::from("datetime")
                }
            }
            ValueKind::Blob => String::from("blob"),
            ValueKind::Uuid => String::from("varchar(36)"),
            ValueKind::Custom(_) => {
                if let Some(class) = self.extra_types.get(kind) {
                    class.clone()
                } else if self
                    .serializer
                    .as_ref()
                    .is_some_and(|s| s.can_deserialize(kind))
                {
                    String::from("blob")
                } else {
                    return Err(Error::UnsupportedType { kind: kind.clone() });
                }
            }
        };
        Ok(class)
    }
}
