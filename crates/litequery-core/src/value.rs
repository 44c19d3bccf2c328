//! Runtime values and statement parameters.
//!
//! [`Value`] is what expressions carry around while they are compiled. Before
//! anything reaches the database it is reduced to a [`SqlValue`], one of the
//! five storage classes SQLite knows about.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

use crate::error::{Error, Result};
use crate::types::ValueKind;

/// Number of ticks (100 ns units) in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks at 9999-12-31 23:59:59.9999999, the last storable date-time.
pub const MAX_DATETIME_TICKS: i64 = 3_155_378_975_999_999_999;

/// Text layout used for date-times stored as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A bound statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

/// A value flowing through an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Time span.
    Duration(TimeDelta),
    /// In-memory collection, expanded to a placeholder list when captured.
    List(Vec<Value>),
    /// Named members of a captured object.
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a list value.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToValue,
    {
        Self::List(items.into_iter().map(|item| item.to_value()).collect())
    }

    /// Builds a record value from `(member, value)` pairs.
    pub fn record<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns whether this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reduces the value to a statement argument.
    ///
    /// Date-times become ticks or text depending on `datetime_as_ticks`;
    /// lists and records cannot be bound.
    pub fn to_sql_value(&self, datetime_as_ticks: bool) -> Result<SqlValue> {
        Ok(match self {
            Self::Null => SqlValue::Null,
            Self::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Self::Int(n) => SqlValue::Integer(*n),
            Self::Float(f) => SqlValue::Real(*f),
            Self::Text(s) => SqlValue::Text(s.clone()),
            Self::Blob(b) => SqlValue::Blob(b.clone()),
            Self::DateTime(dt) => {
                if datetime_as_ticks {
                    SqlValue::Integer(datetime_ticks(dt)?)
                } else {
                    SqlValue::Text(dt.format(DATETIME_FORMAT).to_string())
                }
            }
            Self::Duration(d) => SqlValue::Integer(duration_ticks(d)?),
            Self::List(_) | Self::Record(_) => {
                return Err(Error::UnsupportedValue(self.to_string()));
            }
        })
    }

    /// Converts the value to `kind`, as a cast in an expression would.
    ///
    /// `Null` converts to `Null` for every kind.
    pub fn convert_to(&self, kind: &ValueKind) -> Result<Self> {
        if self.is_null() {
            return Ok(Self::Null);
        }
        let fail = || Error::Conversion {
            value: self.to_string(),
            target: kind.to_string(),
        };
        match kind {
            ValueKind::Bool => match self {
                Self::Bool(b) => Ok(Self::Bool(*b)),
                Self::Int(n) => Ok(Self::Bool(*n != 0)),
                Self::Text(s) => s.trim().parse().map(Self::Bool).map_err(|_| fail()),
                _ => Err(fail()),
            },
            k if k.is_integer() || *k == ValueKind::Enum => {
                let n = match self {
                    Self::Bool(b) => i64::from(*b),
                    Self::Int(n) => *n,
                    Self::Float(f) => float_to_int(*f).ok_or_else(fail)?,
                    Self::Text(s) => s.trim().parse::<i64>().map_err(|_| fail())?,
                    _ => return Err(fail()),
                };
                if integer_fits(n, kind) {
                    Ok(Self::Int(n))
                } else {
                    Err(fail())
                }
            }
            ValueKind::F32 | ValueKind::F64 | ValueKind::Decimal => match self {
                Self::Bool(b) => Ok(Self::Float(f64::from(u8::from(*b)))),
                #[allow(clippy::cast_precision_loss)]
                Self::Int(n) => Ok(Self::Float(*n as f64)),
                Self::Float(f) => Ok(Self::Float(*f)),
                Self::Text(s) => s.trim().parse().map(Self::Float).map_err(|_| fail()),
                _ => Err(fail()),
            },
            ValueKind::Text | ValueKind::Document => match self {
                Self::Text(s) => Ok(Self::Text(s.clone())),
                Self::Bool(_) | Self::Int(_) | Self::Float(_) => Ok(Self::Text(self.to_string())),
                Self::DateTime(dt) => Ok(Self::Text(dt.format(DATETIME_FORMAT).to_string())),
                _ => Err(fail()),
            },
            ValueKind::Uuid => match self {
                Self::Text(s) => Ok(Self::Text(s.clone())),
                _ => Err(fail()),
            },
            ValueKind::DateTime => match self {
                Self::DateTime(dt) => Ok(Self::DateTime(*dt)),
                _ => Err(fail()),
            },
            ValueKind::Duration => match self {
                Self::Duration(d) => Ok(Self::Duration(*d)),
                _ => Err(fail()),
            },
            ValueKind::Blob => match self {
                Self::Blob(b) => Ok(Self::Blob(b.clone())),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Duration(d) => write!(f, "{d}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Record(members) => {
                write!(f, "{{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Reads named members off a runtime value.
///
/// This is how member accesses on captured values are evaluated while a
/// query is compiled.
pub trait MemberAccess {
    /// Returns the value of `member`, or `None` if there is no such member.
    fn member_value(&self, member: &str) -> Option<Value>;
}

impl MemberAccess for Value {
    fn member_value(&self, member: &str) -> Option<Value> {
        match self {
            Self::Record(members) => members.get(member).cloned(),
            Self::List(items) if member == "len" => {
                i64::try_from(items.len()).ok().map(Value::Int)
            }
            Self::Text(s) if member == "len" => i64::try_from(s.chars().count()).ok().map(Value::Int),
            _ => None,
        }
    }
}

fn tick_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Ticks (100 ns units) elapsed since 0001-01-01 00:00:00.
///
/// Fails with [`Error::Conversion`] for date-times outside years 1 to 9999.
pub fn datetime_ticks(dt: &NaiveDateTime) -> Result<i64> {
    duration_ticks(&dt.signed_duration_since(tick_epoch()))
        .ok()
        .filter(|ticks| (0..=MAX_DATETIME_TICKS).contains(ticks))
        .ok_or_else(|| Error::Conversion {
            value: dt.to_string(),
            target: String::from("ticks"),
        })
}

/// Ticks (100 ns units) in a time span.
///
/// Fails with [`Error::Conversion`] when the count does not fit in an `i64`.
pub fn duration_ticks(d: &TimeDelta) -> Result<i64> {
    d.num_seconds()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(i64::from(d.subsec_nanos() / 100)))
        .ok_or_else(|| Error::Conversion {
            value: d.to_string(),
            target: String::from("ticks"),
        })
}

/// The date-time `ticks` after 0001-01-01 00:00:00.
pub fn datetime_from_ticks(ticks: i64) -> Result<NaiveDateTime> {
    (0..=MAX_DATETIME_TICKS)
        .contains(&ticks)
        .then(|| tick_epoch().checked_add_signed(duration_from_ticks(ticks)))
        .flatten()
        .ok_or_else(|| Error::Conversion {
            value: ticks.to_string(),
            target: String::from("date-time"),
        })
}

/// The time span of `ticks`.
#[must_use]
pub fn duration_from_ticks(ticks: i64) -> TimeDelta {
    let secs = ticks / TICKS_PER_SECOND;
    let nanos = (ticks % TICKS_PER_SECOND) * 100;
    TimeDelta::seconds(secs) + TimeDelta::nanoseconds(nanos)
}

fn float_to_int(f: f64) -> Option<i64> {
    let rounded = f.round_ties_even();
    #[allow(clippy::cast_precision_loss)]
    let in_range = rounded >= i64::MIN as f64 && rounded < i64::MAX as f64;
    #[allow(clippy::cast_possible_truncation)]
    in_range.then_some(rounded as i64)
}

fn integer_fits(n: i64, kind: &ValueKind) -> bool {
    match kind {
        ValueKind::I8 => i8::try_from(n).is_ok(),
        ValueKind::I16 => i16::try_from(n).is_ok(),
        ValueKind::I32 => i32::try_from(n).is_ok(),
        ValueKind::U8 => u8::try_from(n).is_ok(),
        ValueKind::U16 => u16::try_from(n).is_ok(),
        ValueKind::U32 => u32::try_from(n).is_ok(),
        ValueKind::U64 => n >= 0,
        _ => true,
    }
}

/// Trait for types that can be converted to expression values.
pub trait ToValue {
    /// Converts the value to a [`Value`].
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! impl_to_value_int {
    ($($ty:ty),+) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )+
    };
}

impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        // Values above i64::MAX only fit a real.
        #[allow(clippy::cast_precision_loss)]
        i64::try_from(*self).map_or_else(|_| Value::Float(*self as f64), Value::Int)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(String::from(self))
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl<Tz: TimeZone> ToValue for DateTime<Tz> {
    fn to_value(&self) -> Value {
        Value::DateTime(self.naive_utc())
    }
}

impl ToValue for TimeDelta {
    fn to_value(&self) -> Value {
        Value::Duration(*self)
    }
}
