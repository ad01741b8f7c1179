//! Maintenance jobs that load scraper output into the listing store
//!
//! The scraper writes either one JSON array of listings (`scraped_properties.json`)
//! or one object per listing (`raw_scrape/<id>.json`). Both layouts are accepted.
//! None of this is reachable from the HTTP routes.

use crate::models::Listing;
use crate::store::sqlite::{ensure_schema, insert_listing};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrapeFile {
    Many(Vec<Listing>),
    One(Box<Listing>),
}

/// Parse the contents of one scrape file
pub fn file_processing(raw: &str) -> Result<Vec<Listing>> {
    let parsed: ScrapeFile =
        serde_json::from_str(raw).context("Scrape file is neither a listing nor a list of listings")?;
    Ok(match parsed {
        ScrapeFile::Many(listings) => listings,
        ScrapeFile::One(listing) => vec![*listing],
    })
}

/// Load one scrape file into the store, returning how many new rows were written
pub fn process_file(conn: &mut Connection, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let listings =
        file_processing(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;

    ensure_schema(conn).context("Failed to prepare listings table")?;
    let tx = conn.transaction()?;
    let mut inserted = 0;
    for listing in &listings {
        if listing.sqm <= 0 {
            debug!(id = %listing.id, "listing has no size, price per m² left empty");
        }
        inserted += insert_listing(&tx, listing)
            .with_context(|| format!("Failed to insert listing {}", listing.id))?;
    }
    tx.commit()?;

    info!(
        "💾 {}: {} listings, {} new rows",
        path.display(),
        listings.len(),
        inserted
    );
    Ok(inserted)
}

/// Load every `*.json` file in `dir`, in name order
pub fn refresh_database(conn: &mut Connection, dir: &Path) -> Result<usize> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        warn!("No scrape files found in {}", dir.display());
    }

    let mut total = 0;
    for file in &files {
        total += process_file(conn, file)?;
    }

    info!("✅ Refreshed database from {} files, {} new rows", files.len(), total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"{
        "id": "1", "source": "Booli",
        "location": {"city": "Warsaw", "area": "Mokotow", "latitude": 52.2, "longitude": 21.0},
        "address": "Main 1", "price": 400000, "rooms": 2.0, "sqm": 40,
        "description": "", "features": ["Balkong"], "images": [],
        "url": "https://example.com/1", "scraped_at": "2024-03-01T09:30:00Z",
        "raw_data": {"source": "test"}
    }"#;

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn file_processing_accepts_both_layouts() {
        assert_eq!(file_processing(ONE).unwrap().len(), 1);
        let many = format!("[{},{}]", ONE, ONE.replace("\"id\": \"1\"", "\"id\": \"2\""));
        assert_eq!(file_processing(&many).unwrap().len(), 2);
        assert!(file_processing("{\"id\": 1}").is_err());
    }

    #[test]
    fn refresh_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.json"), ONE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let mut conn = Connection::open_in_memory().unwrap();

        assert_eq!(refresh_database(&mut conn, dir.path()).unwrap(), 1);
        assert_eq!(refresh_database(&mut conn, dir.path()).unwrap(), 0);
        assert_eq!(count(&conn), 1);

        let price_sqm: f64 = conn
            .query_row("SELECT price_sqm FROM listings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(price_sqm, 10000.0);
    }

    #[test]
    fn process_file_reports_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let err = process_file(&mut conn, &dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
