//! SQLite-backed listing store
//!
//! Each search opens its own read-only connection and runs on the blocking pool,
//! so a slow statement can be interrupted without touching other requests.

use crate::error::ExecutionError;
use crate::models::{Cell, Listing, ResultTable, TIMESTAMP_FORMAT};
use crate::query::SearchQuery;
use crate::store::traits::ListingStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, InterruptHandle, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        link TEXT NOT NULL,
        city TEXT NOT NULL,
        area TEXT,
        address TEXT NOT NULL,
        price INTEGER NOT NULL,
        rooms REAL,
        size REAL NOT NULL,
        price_sqm REAL,
        scrap_time TIMESTAMP NOT NULL,
        UNIQUE (link, scrap_time)
    );
    CREATE INDEX IF NOT EXISTS idx_listings_city_size ON listings (city, size);";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create the `listings` table and its index if they do not exist yet
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Insert one scrape, ignoring it when the same (link, scrape time) is already stored
///
/// Returns the number of rows written (0 or 1).
pub fn insert_listing(conn: &Connection, listing: &Listing) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO listings
            (link, city, area, address, price, rooms, size, price_sqm, scrap_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(params![
        listing.url,
        listing.location.city,
        listing.location.area,
        listing.address,
        listing.price,
        f64::from(listing.rooms),
        f64::from(listing.sqm),
        listing.price_per_sqm(),
        listing.scraped_at.naive_utc().format(TIMESTAMP_FORMAT).to_string(),
    ])
}

/// Listing store reading from a SQLite database file
pub struct SqliteStore {
    path: PathBuf,
    query_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, query_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            query_timeout,
        }
    }

    /// Run `work` on a fresh read-only connection on the blocking pool.
    ///
    /// The connection is opened inside the blocking task; its interrupt handle
    /// comes back over a channel so the statement can be cancelled once
    /// `query_timeout` expires.
    pub(crate) async fn execute<F>(
        &self,
        query: &SearchQuery,
        work: F,
    ) -> Result<ResultTable, ExecutionError>
    where
        F: FnOnce(&Connection) -> Result<ResultTable, ExecutionError> + Send + 'static,
    {
        let path = self.path.clone();
        let (handle_tx, handle_rx) = oneshot::channel::<InterruptHandle>();
        let task = tokio::task::spawn_blocking(move || {
            let conn = open_read_only(&path)?;
            let _ = handle_tx.send(conn.get_interrupt_handle());
            work(&conn)
        });

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(joined) => {
                let table = joined.map_err(|e| ExecutionError::Worker(e.to_string()))??;
                debug!(
                    kind = query.kind.as_str(),
                    rows = table.row_count(),
                    "query finished"
                );
                Ok(table)
            }
            Err(_) => {
                // The sender is dropped without a handle if the open itself failed
                if let Ok(handle) = handle_rx.await {
                    handle.interrupt();
                }
                warn!(
                    kind = query.kind.as_str(),
                    city = %query.city,
                    timeout = ?self.query_timeout,
                    "query timed out, interrupted"
                );
                Err(ExecutionError::Timeout(self.query_timeout))
            }
        }
    }
}

fn open_read_only(path: &Path) -> Result<Connection, ExecutionError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn fetch(&self, query: &SearchQuery) -> Result<ResultTable, ExecutionError> {
        let owned = query.clone();
        self.execute(query, move |conn| run_query(conn, &owned)).await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// Execute a search on an open connection and collect every row
pub fn run_query(conn: &Connection, query: &SearchQuery) -> Result<ResultTable, ExecutionError> {
    let min_size = parse_bound(&query.min_size)?;
    let max_size = parse_bound(&query.max_size)?;

    let mut stmt = conn.prepare(query.sql())?;
    let temporal: Vec<bool> = stmt
        .columns()
        .iter()
        .map(|column| column.decl_type().map_or(false, is_temporal))
        .collect();
    let mut table = ResultTable::new(
        stmt.column_names()
            .into_iter()
            .map(String::from)
            .collect(),
    );

    let mut rows = stmt.query(params![query.city, min_size, max_size])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(temporal.len());
        for (idx, &is_time) in temporal.iter().enumerate() {
            cells.push(to_cell(row.get_ref(idx)?, is_time));
        }
        table.rows.push(cells);
    }

    Ok(table)
}

fn parse_bound(raw: &str) -> Result<f64, ExecutionError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ExecutionError::InvalidBound(raw.to_string())),
    }
}

fn is_temporal(decl_type: &str) -> bool {
    let decl_type = decl_type.to_ascii_uppercase();
    decl_type.contains("TIME") || decl_type.contains("DATE")
}

fn to_cell(value: ValueRef<'_>, temporal: bool) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match temporal.then(|| parse_timestamp(&text)).flatten() {
                Some(ts) => Cell::Timestamp(ts),
                None => Cell::Text(text),
            }
        }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;
    use crate::testing::{listing, seeded_store, seeded_store_with_timeout, spin};

    #[tokio::test]
    async fn latest_keeps_only_newest_scrape_per_listing() {
        let (_dir, store) = seeded_store(&[
            listing("A", "Warsaw", 400_000, 40, "2024-03-01T09:00:00Z"),
            listing("A", "Warsaw", 390_000, 40, "2024-03-08T09:00:00Z"),
            listing("B", "Warsaw", 500_000, 45, "2024-03-01T09:05:00Z"),
        ]);

        let query = SearchQuery::build(QueryKind::Latest, "Warsaw", "30", "50");
        let table = store.fetch(&query).await.unwrap();

        assert_eq!(table.row_count(), 2);
        let price = table.column_index("price").unwrap();
        let time = table.column_index("scrap_time").unwrap();
        assert_eq!(table.rows[0][price], Cell::Integer(390_000));
        assert_eq!(table.rows[0][time].to_string(), "2024-03-08 09:00:00");
        assert!(matches!(table.rows[0][time], Cell::Timestamp(_)));
    }

    #[tokio::test]
    async fn entire_filters_by_city_and_size() {
        let (_dir, store) = seeded_store(&[
            listing("A", "Warsaw", 400_000, 40, "2024-03-01T09:00:00Z"),
            listing("A", "Warsaw", 390_000, 40, "2024-03-08T09:00:00Z"),
            listing("C", "Warsaw", 900_000, 80, "2024-03-01T09:00:00Z"),
            listing("D", "Krakow", 300_000, 35, "2024-03-01T09:00:00Z"),
        ]);

        let query = SearchQuery::build(QueryKind::Entire, "Warsaw", "30", "50");
        let table = store.fetch(&query).await.unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0], "link");
        assert!(table.rows.iter().all(|r| r[0] == Cell::Text("A".into())));
    }

    #[tokio::test]
    async fn prices_over_time_averages_per_day() {
        let (_dir, store) = seeded_store(&[
            listing("A", "Warsaw", 400_000, 40, "2024-03-01T09:00:00Z"),
            listing("B", "Warsaw", 600_000, 40, "2024-03-01T09:01:00Z"),
            listing("A", "Warsaw", 360_000, 40, "2024-03-02T09:00:00Z"),
        ]);

        let query = SearchQuery::build(QueryKind::PricesOverTime, "Warsaw", "30", "50");
        let table = store.fetch(&query).await.unwrap();

        assert_eq!(table.columns, vec!["scrapped_time", "average_price_sqm"]);
        assert_eq!(
            table.rows,
            vec![
                vec![Cell::Text("2024-03-01".into()), Cell::Real(12500.0)],
                vec![Cell::Text("2024-03-02".into()), Cell::Real(9000.0)],
            ]
        );
    }

    #[tokio::test]
    async fn non_numeric_bound_is_an_execution_error() {
        let (_dir, store) = seeded_store(&[]);
        let query = SearchQuery::build(QueryKind::Entire, "Warsaw", "thirty", "50");
        let err = store.fetch(&query).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidBound(ref b) if b == "thirty"));
    }

    #[tokio::test]
    async fn missing_database_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("absent.db"), Duration::from_secs(5));
        let query = SearchQuery::build(QueryKind::Entire, "X", "0", "100");
        let err = store.fetch(&query).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Database(_)));
    }

    #[tokio::test]
    async fn slow_query_times_out_and_is_interrupted() {
        let timeout = Duration::from_millis(100);
        let (_dir, store) = seeded_store_with_timeout(&[], timeout);
        let (done_tx, done_rx) = oneshot::channel();

        let query = SearchQuery::build(QueryKind::Entire, "Warsaw", "0", "100");
        let err = store
            .execute(&query, move |conn| {
                let _ = done_tx.send(spin(conn));
                Ok(ResultTable::new(Vec::new()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(t) if t == timeout));

        // The statement only ends if the interrupt reached the connection
        let outcome = tokio::time::timeout(Duration::from_secs(10), done_rx)
            .await
            .expect("statement kept running after the timeout")
            .unwrap();
        match outcome {
            Err(rusqlite::Error::SqliteFailure(e, _)) => {
                assert_eq!(e.code, rusqlite::ErrorCode::OperationInterrupted)
            }
            other => panic!("expected an interrupted statement, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fast_query_finishes_within_timeout() {
        let (_dir, store) = seeded_store_with_timeout(
            &[listing("A", "Warsaw", 400_000, 40, "2024-03-01T09:00:00Z")],
            Duration::from_secs(5),
        );
        let query = SearchQuery::build(QueryKind::Entire, "Warsaw", "0", "100");
        assert_eq!(store.fetch(&query).await.unwrap().row_count(), 1);
    }

    #[test]
    fn reinserting_a_scrape_is_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let scrape = listing("A", "Warsaw", 400_000, 40, "2024-03-01T09:00:00Z");
        assert_eq!(insert_listing(&conn, &scrape).unwrap(), 1);
        assert_eq!(insert_listing(&conn, &scrape).unwrap(), 0);
    }

    #[test]
    fn timestamps_parse_in_common_layouts() {
        assert!(parse_timestamp("2024-03-01 09:00:00").is_some());
        assert!(parse_timestamp("2024-03-01T09:00:00.250").is_some());
        assert!(parse_timestamp("2024-03-01T09:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
