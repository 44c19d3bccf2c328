//! Decoding of tick-encoded columns.
//!
//! Durations are always stored as ticks, and date-times are when
//! [`ConnectionOptions::store_datetime_as_ticks`] is on. sqlx reads an
//! integer date-time as a unix timestamp, so such fields name one of these
//! types in their `FromRow` derive:
//!
//! ```ignore
//! #[derive(Storable, sqlx::FromRow)]
//! struct Lap {
//!     #[column(primary_key)]
//!     id: i64,
//!     #[sqlx(try_from = "DateTimeTicks")]
//!     started: NaiveDateTime,
//!     #[sqlx(try_from = "DurationTicks")]
//!     took: TimeDelta,
//! }
//! ```
//!
//! [`ConnectionOptions::store_datetime_as_ticks`]: crate::ConnectionOptions::store_datetime_as_ticks

use chrono::{NaiveDateTime, TimeDelta};
use litequery_core::value::{datetime_from_ticks, duration_from_ticks};
use sqlx::error::BoxDynError;
use sqlx::sqlite::{Sqlite, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Type};

/// A date-time read from an integer tick column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTimeTicks(pub NaiveDateTime);

/// A time span read from an integer tick column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DurationTicks(pub TimeDelta);

impl Type<Sqlite> for DateTimeTicks {
    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Sqlite> for DateTimeTicks {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let ticks = <i64 as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Self(datetime_from_ticks(ticks)?))
    }
}

impl Type<Sqlite> for DurationTicks {
    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Sqlite> for DurationTicks {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let ticks = <i64 as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Self(duration_from_ticks(ticks)))
    }
}

impl From<DateTimeTicks> for NaiveDateTime {
    fn from(ticks: DateTimeTicks) -> Self {
        ticks.0
    }
}

impl From<DurationTicks> for TimeDelta {
    fn from(ticks: DurationTicks) -> Self {
        ticks.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decode_tick_columns() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let (at, took): (DateTimeTicks, DurationTicks) =
            sqlx::query_as("select 638397936000000000, -15")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(
            NaiveDateTime::from(at),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap()
        );
        assert_eq!(TimeDelta::from(took), TimeDelta::nanoseconds(-1_500));
    }

    #[tokio::test]
    async fn test_decode_rejects_ticks_before_calendar() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let err = sqlx::query_scalar::<_, DateTimeTicks>("select -1")
            .fetch_one(&pool)
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::ColumnDecode { .. }));
    }
}
