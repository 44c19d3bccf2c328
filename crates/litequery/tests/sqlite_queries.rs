//! Queries executed against an in-memory SQLite database.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use futures::TryStreamExt;
use litequery::expr::{captured, field, lambda};
use litequery::{
    Connection, ConnectionOptions, CreateFlags, DateTimeTicks, DurationTicks, OrmError, Storable,
    Value,
};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Storable, FromRow)]
#[table(name = "stocks")]
struct Stock {
    #[column(primary_key, autoincrement)]
    id: i64,
    #[column(max_length = 8, indexed)]
    symbol: String,
    price: f64,
    listed: bool,
    note: Option<String>,
}

fn stock(symbol: &str, price: f64, listed: bool) -> Stock {
    Stock {
        id: 0,
        symbol: symbol.to_owned(),
        price,
        listed,
        note: None,
    }
}

async fn setup() -> Connection {
    let conn = Connection::open(":memory:").await.unwrap();
    conn.create_table::<Stock>().await.unwrap();
    let rows = vec![
        stock("ACME", 10.5, true),
        stock("INIT", 3.25, true),
        stock("ZETA", 7.75, false),
        stock("ABBA", 1.5, true),
    ];
    assert_eq!(conn.insert_all(&rows).await.unwrap(), 4);
    conn
}

// =============================================================================
// Test: Table creation and single-row access
// =============================================================================

#[tokio::test]
async fn test_create_table_is_idempotent() {
    let conn = setup().await;
    conn.create_table::<Stock>().await.unwrap();

    let indices: Vec<String> = sqlx::query_scalar(
        "select name from sqlite_master where type = 'index' and tbl_name = 'stocks'",
    )
    .fetch_all(conn.pool())
    .await
    .unwrap();
    assert!(indices.contains(&String::from("stocks_symbol")));
}

#[tokio::test]
async fn test_insert_fills_autoincrement_key() {
    let conn = Connection::open(":memory:").await.unwrap();
    conn.create_table::<Stock>().await.unwrap();

    let id = conn.insert(&stock("ACME", 10.5, true)).await.unwrap();
    assert_eq!(id, 1);
    let id = conn.insert(&stock("INIT", 3.25, false)).await.unwrap();
    assert_eq!(id, 2);

    let loaded: Stock = conn.get(2).await.unwrap();
    assert_eq!(loaded.symbol, "INIT");
    assert!(!loaded.listed);
    assert_eq!(loaded.note, None);
}

#[tokio::test]
async fn test_get_missing_row() {
    let conn = setup().await;
    let err = conn.get::<Stock>(99).await.unwrap_err();
    assert!(matches!(err, OrmError::NotFound));
    assert!(conn.find::<Stock>(99).await.unwrap().is_none());
    assert!(conn.find::<Stock>(1).await.unwrap().is_some());
}

// =============================================================================
// Test: Filtering and ordering
// =============================================================================

#[tokio::test]
async fn test_filter_and_order() {
    let conn = setup().await;
    let listed = conn
        .table::<Stock>()
        .unwrap()
        .filter(lambda(field("listed")))
        .unwrap()
        .order_by(&lambda(field("symbol")))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    let symbols: Vec<&str> = listed.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ABBA", "ACME", "INIT"]);
}

#[tokio::test]
async fn test_not_on_boolean_column() {
    let conn = setup().await;
    let unlisted = conn
        .table::<Stock>()
        .unwrap()
        .filter(lambda(field("listed").not()))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(unlisted.len(), 1);
    assert_eq!(unlisted[0].symbol, "ZETA");
}

#[tokio::test]
async fn test_captured_collection() {
    let conn = setup().await;
    let wanted = captured("wanted", Value::list(["ACME", "ZETA", "NOPE"]));
    let found = conn
        .table::<Stock>()
        .unwrap()
        .filter(lambda(wanted.contains(field("symbol"))))
        .unwrap()
        .order_by_descending(&lambda(field("price")))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    let symbols: Vec<&str> = found.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ACME", "ZETA"]);
}

#[tokio::test]
async fn test_text_predicates() {
    let conn = setup().await;
    let table = conn.table::<Stock>().unwrap();

    let prefixed = table
        .filter(lambda(field("symbol").starts_with("A")))
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(prefixed, 2);

    let not_prefixed = table
        .filter(lambda(field("symbol").starts_with("A").not()))
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(not_prefixed, 2);
}

#[tokio::test]
async fn test_null_comparison() {
    let conn = setup().await;
    let mut noted = stock("NOTE", 2.0, true);
    noted.note = Some(String::from("watch"));
    conn.insert(&noted).await.unwrap();

    let table = conn.table::<Stock>().unwrap();
    let without = table
        .count_where(lambda(field("note").eq(Value::Null)))
        .await
        .unwrap();
    assert_eq!(without, 4);
    let with = table
        .count_where(lambda(field("note").ne(Value::Null)))
        .await
        .unwrap();
    assert_eq!(with, 1);
}

// =============================================================================
// Test: Paging and element access
// =============================================================================

#[tokio::test]
async fn test_take_and_skip() {
    let conn = setup().await;
    let ordered = conn
        .table::<Stock>()
        .unwrap()
        .order_by(&lambda(field("price")))
        .unwrap();

    let page = ordered.skip(1).take(2).to_vec().await.unwrap();
    let prices: Vec<f64> = page.iter().map(|s| s.price).collect();
    assert_eq!(prices, vec![3.25, 7.75]);

    let rest = ordered.skip(3).to_vec().await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].symbol, "ACME");
}

#[tokio::test]
async fn test_first_and_element_at() {
    let conn = setup().await;
    let ordered = conn
        .table::<Stock>()
        .unwrap()
        .order_by(&lambda(field("symbol")))
        .unwrap();

    assert_eq!(ordered.first().await.unwrap().symbol, "ABBA");
    assert_eq!(ordered.element_at(2).await.unwrap().symbol, "INIT");
    assert!(matches!(
        ordered.element_at(10).await.unwrap_err(),
        OrmError::NotFound
    ));

    let none = ordered
        .filter(lambda(field("price").gt(100.0)))
        .unwrap()
        .first_or_default()
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_projection() {
    let conn = setup().await;
    let symbols: Vec<String> = conn
        .table::<Stock>()
        .unwrap()
        .order_by_descending(&lambda(field("symbol")))
        .unwrap()
        .take(2)
        .select::<String>(&lambda(field("symbol")))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(symbols, vec!["ZETA", "INIT"]);
}

// =============================================================================
// Test: Streaming
// =============================================================================

#[tokio::test]
async fn test_deferred_rows_release_cursor_on_drop() {
    let conn = setup().await;
    let compiled = conn
        .table::<Stock>()
        .unwrap()
        .order_by(&lambda(field("id")))
        .unwrap()
        .deferred()
        .compile()
        .unwrap();

    let mut rows = compiled.rows();
    let first = rows.try_next().await.unwrap().unwrap();
    assert_eq!(first.symbol, "ACME");
    drop(rows);

    // The only pooled connection is available again.
    assert_eq!(conn.table::<Stock>().unwrap().count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_eager_rows_stream_everything() {
    let conn = setup().await;
    let compiled = conn.table::<Stock>().unwrap().compile().unwrap();
    assert_eq!(compiled.statement().sql, "select * from \"stocks\"");
    let all: Vec<Stock> = compiled.rows().try_collect().await.unwrap();
    assert_eq!(all.len(), 4);
}

// =============================================================================
// Test: Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_variants() {
    let conn = setup().await;

    assert_eq!(conn.delete::<Stock>(1).await.unwrap(), 1);
    assert_eq!(conn.delete::<Stock>(1).await.unwrap(), 0);
    assert_eq!(conn.delete_in::<Stock>(&[]).await.unwrap(), 0);
    assert_eq!(
        conn.delete_in::<Stock>(&[Value::Int(2), Value::Int(3)])
            .await
            .unwrap(),
        2
    );
    assert_eq!(conn.delete_all::<Stock>().await.unwrap(), 1);
    assert_eq!(conn.table::<Stock>().unwrap().count().await.unwrap(), 0);
}

#[derive(Debug, Clone, PartialEq, Storable, FromRow)]
#[table(name = "routes")]
struct Route {
    #[column(primary_key)]
    origin: String,
    #[column(primary_key, indexed)]
    destination: String,
    fare: i32,
}

fn route(origin: &str, destination: &str, fare: i32) -> Route {
    Route {
        origin: origin.to_owned(),
        destination: destination.to_owned(),
        fare,
    }
}

fn key(origin: &str, destination: &str) -> [Value; 2] {
    [
        Value::Text(origin.to_owned()),
        Value::Text(destination.to_owned()),
    ]
}

#[tokio::test]
async fn test_composite_key_access() {
    let conn = Connection::open(":memory:").await.unwrap();
    conn.create_table::<Route>().await.unwrap();
    let routes = vec![
        route("AMS", "BER", 90),
        route("AMS", "CDG", 70),
        route("BER", "AMS", 95),
        route("CDG", "AMS", 60),
        route("CDG", "BER", 80),
    ];
    conn.insert_all(&routes).await.unwrap();

    let found: Route = conn.get_by_keys(&key("CDG", "BER")).await.unwrap();
    assert_eq!(found.fare, 80);
    assert!(conn
        .find_by_keys::<Route>(&key("BER", "CDG"))
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        conn.get::<Route>("AMS").await.unwrap_err(),
        OrmError::Query(litequery_core::Error::KeyMismatch { .. })
    ));

    // Full key
    assert_eq!(
        conn.delete_by_keys::<Route>(&key("AMS", "BER")).await.unwrap(),
        1
    );
    assert_eq!(conn.table::<Route>().unwrap().count().await.unwrap(), 4);

    // Partial key
    assert_eq!(conn.delete::<Route>("BER").await.unwrap(), 1);
    assert_eq!(conn.table::<Route>().unwrap().count().await.unwrap(), 3);
    assert_eq!(
        conn.delete_by_keys::<Route>(&[Value::Text(String::from("CDG"))])
            .await
            .unwrap(),
        2
    );

    let left = conn.table::<Route>().unwrap().to_vec().await.unwrap();
    assert_eq!(left, vec![route("AMS", "CDG", 70)]);
}

// =============================================================================
// Test: Date-times and durations
// =============================================================================

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|d| d.and_hms_milli_opt(hour, 15, 30, 250))
        .unwrap()
}

#[derive(Debug, Clone, PartialEq, Storable, FromRow)]
#[table(name = "laps")]
struct Lap {
    #[column(primary_key, autoincrement)]
    id: i64,
    started: NaiveDateTime,
    finished: Option<NaiveDateTime>,
    #[sqlx(try_from = "DurationTicks")]
    took: TimeDelta,
}

#[tokio::test]
async fn test_datetime_text_round_trip() {
    let conn = Connection::open(":memory:").await.unwrap();
    conn.create_table::<Lap>().await.unwrap();
    let laps = vec![
        Lap {
            id: 0,
            started: at(2, 9),
            finished: Some(at(2, 10)),
            took: TimeDelta::milliseconds(61_500),
        },
        Lap {
            id: 0,
            started: at(3, 9),
            finished: None,
            took: TimeDelta::seconds(-5),
        },
    ];
    conn.insert_all(&laps).await.unwrap();

    let table = conn.table::<Lap>().unwrap();
    let loaded = table
        .order_by(&lambda(field("id")))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].started, at(2, 9));
    assert_eq!(loaded[0].finished, Some(at(2, 10)));
    assert_eq!(loaded[0].took, TimeDelta::milliseconds(61_500));
    assert_eq!(loaded[1].finished, None);
    assert_eq!(loaded[1].took, TimeDelta::seconds(-5));

    let early = table
        .filter(lambda(field("started").lt(at(3, 0))))
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(early, vec![loaded[0].clone()]);

    let long: Vec<Lap> = table
        .filter(lambda(field("took").gt(TimeDelta::minutes(1))))
        .unwrap()
        .compile()
        .unwrap()
        .rows()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(long, vec![loaded[0].clone()]);
}

#[derive(Debug, Clone, PartialEq, Storable, FromRow)]
#[table(name = "tick_laps")]
struct TickLap {
    #[column(primary_key, autoincrement)]
    id: i64,
    #[sqlx(try_from = "DateTimeTicks")]
    started: NaiveDateTime,
    #[sqlx(try_from = "DurationTicks")]
    took: TimeDelta,
}

#[tokio::test]
async fn test_datetime_ticks_round_trip() {
    let options = ConnectionOptions::new().store_datetime_as_ticks(true);
    let conn = Connection::open_with(":memory:", options).await.unwrap();
    conn.create_table::<TickLap>().await.unwrap();
    let last = NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
        .unwrap();
    for started in [at(2, 9), last, at(1, 0)] {
        conn.insert(&TickLap {
            id: 0,
            started,
            took: TimeDelta::milliseconds(250),
        })
        .await
        .unwrap();
    }

    let compiled = conn
        .table::<TickLap>()
        .unwrap()
        .order_by(&lambda(field("started")))
        .unwrap()
        .deferred()
        .compile()
        .unwrap();
    let ordered: Vec<NaiveDateTime> = compiled
        .rows()
        .map_ok(|lap| lap.started)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(ordered, vec![at(1, 0), at(2, 9), last]);

    let lap: TickLap = conn.get(2).await.unwrap();
    assert_eq!(lap.started, last);
    assert_eq!(lap.took, TimeDelta::milliseconds(250));

    let out_of_range = TickLap {
        id: 0,
        started: NaiveDate::from_ymd_opt(40_000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap(),
        took: TimeDelta::zero(),
    };
    assert!(matches!(
        conn.insert(&out_of_range).await.unwrap_err(),
        OrmError::Query(litequery_core::Error::Conversion { .. })
    ));
    assert_eq!(conn.table::<TickLap>().unwrap().count().await.unwrap(), 3);
}

// =============================================================================
// Test: Errors and options
// =============================================================================

#[tokio::test]
async fn test_compile_errors_surface_as_query_errors() {
    let conn = setup().await;
    let table = conn.table::<Stock>().unwrap();

    assert!(matches!(
        table.filter(field("listed")).unwrap_err(),
        OrmError::Query(litequery_core::Error::NotAPredicate(_))
    ));
    assert!(matches!(
        table.join(&table, &field("id"), &field("id"), &field("id")).unwrap_err(),
        OrmError::Query(litequery_core::Error::NotSupported(_))
    ));
    let err = table
        .filter(lambda(field("missing").eq(1)))
        .unwrap()
        .to_vec()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Query(litequery_core::Error::UnknownMember(_))
    ));
}

#[allow(non_snake_case)]
#[derive(Debug, Storable, FromRow)]
struct Visit {
    Id: i64,
    PageId: i64,
}

#[tokio::test]
async fn test_implicit_flags() {
    let options = ConnectionOptions::new()
        .create_flags(CreateFlags::ALL_IMPLICIT | CreateFlags::AUTO_INC_PK);
    let conn = Connection::open_with(":memory:", options).await.unwrap();
    conn.create_table::<Visit>().await.unwrap();

    let mapping = conn.mapping::<Visit>().unwrap();
    assert!(mapping.pk().unwrap().auto_increment);
    assert_eq!(mapping.indices()[0].name, "Visit_PageId");

    conn.insert(&Visit { Id: 0, PageId: 7 }).await.unwrap();
    conn.insert(&Visit { Id: 0, PageId: 8 }).await.unwrap();
    let second: Visit = conn.get(2).await.unwrap();
    assert_eq!(second.PageId, 8);
    assert_eq!(Visit::descriptor().members.len(), 2);
}
