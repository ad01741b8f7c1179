//! Fixtures shared by the unit tests

use crate::models::{Listing, Location};
use crate::store::sqlite::{ensure_schema, insert_listing};
use crate::store::SqliteStore;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::time::Duration;
use tempfile::TempDir;

pub fn listing(link: &str, city: &str, price: i64, sqm: i32, scraped_at: &str) -> Listing {
    Listing {
        id: link.to_string(),
        location: Location {
            city: city.to_string(),
            area: None,
        },
        address: format!("{} street", link),
        price,
        rooms: 2.0,
        sqm,
        url: link.to_string(),
        scraped_at: scraped_at.parse::<DateTime<Utc>>().unwrap(),
    }
}

/// Statement that never finishes on its own
const SPIN_SQL: &str = "WITH RECURSIVE spin(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM spin)
     SELECT count(*) FROM spin";

/// Run a statement that only returns once the connection is interrupted
pub fn spin(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(SPIN_SQL, [], |row| row.get(0))
}

/// A database file in a fresh temp dir, holding `listings`
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub fn seeded_store(listings: &[Listing]) -> (TempDir, SqliteStore) {
    seeded_store_with_timeout(listings, Duration::from_secs(5))
}

pub fn seeded_store_with_timeout(
    listings: &[Listing],
    query_timeout: Duration,
) -> (TempDir, SqliteStore) {
    crate::logging::init_for_tests();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listings.db");
    let conn = Connection::open(&path).unwrap();
    ensure_schema(&conn).unwrap();
    for listing in listings {
        insert_listing(&conn, listing).unwrap();
    }
    drop(conn);

    (dir, SqliteStore::new(path, query_timeout))
}
