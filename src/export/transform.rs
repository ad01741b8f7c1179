//! Reshaping of raw result tables before they are encoded
//!
//! Every function here is pure: a table goes in, a table or a derived structure
//! comes out. A table missing a column the reshaping depends on is rejected with
//! [`TransformError::MissingColumn`].

use crate::error::TransformError;
use crate::models::{Cell, PriceHistoryEntry, ResultTable, TimeSeriesPoint};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Bucket column of the price-over-time query
pub const SERIES_TIME_COLUMN: &str = "scrapped_time";
/// Value column of the price-over-time query
pub const SERIES_PRICE_COLUMN: &str = "average_price_sqm";

const LINK_COLUMN: &str = "link";
const SCRAPE_TIME_COLUMN: &str = "scrap_time";
const PRICE_COLUMN: &str = "price";

fn require(table: &ResultTable, column: &'static str) -> Result<usize, TransformError> {
    table
        .column_index(column)
        .ok_or(TransformError::MissingColumn(column))
}

/// Replace every non-null cell with its string form
///
/// Nulls are left as `Cell::Null` and encode as JSON `null`, not as the text
/// `"None"`.
pub fn stringify_columns(mut table: ResultTable) -> ResultTable {
    for row in &mut table.rows {
        for cell in row.iter_mut() {
            *cell = cell.stringify();
        }
    }
    table
}

/// Replace the cells of one column with their string form
pub fn stringify_column(
    mut table: ResultTable,
    column: &'static str,
) -> Result<ResultTable, TransformError> {
    let idx = require(&table, column)?;
    for row in &mut table.rows {
        row[idx] = row[idx].stringify();
    }
    Ok(table)
}

/// Collapse the price-over-time table into one point per time bucket.
///
/// The bucket, rendered as a string, becomes the index, so it has to be unique.
pub fn price_series(table: ResultTable) -> Result<Vec<TimeSeriesPoint>, TransformError> {
    let table = stringify_column(table, SERIES_TIME_COLUMN)?;
    let time = require(&table, SERIES_TIME_COLUMN)?;
    let price = require(&table, SERIES_PRICE_COLUMN)?;

    let mut seen = HashSet::with_capacity(table.row_count());
    let mut points = Vec::with_capacity(table.row_count());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let timestamp = row[time].to_string();
        if !seen.insert(timestamp.clone()) {
            return Err(TransformError::DuplicateIndex(timestamp));
        }

        let average_price_sqm = match &row[price] {
            Cell::Null => None,
            cell => Some(cell.as_f64().ok_or(TransformError::NotNumeric {
                column: SERIES_PRICE_COLUMN,
                row: row_idx,
            })?),
        };

        points.push(TimeSeriesPoint {
            timestamp,
            average_price_sqm,
        });
    }

    Ok(points)
}

/// Group (link, scrape time, price) rows into one history per listing.
///
/// Listings come out sorted by link; observations keep the order the store
/// returned them in. Rows without a link cannot be grouped and are dropped.
pub fn price_history(table: &ResultTable) -> Result<Vec<PriceHistoryEntry>, TransformError> {
    let link = require(table, LINK_COLUMN)?;
    let time = require(table, SCRAPE_TIME_COLUMN)?;
    let price = require(table, PRICE_COLUMN)?;

    let mut groups: BTreeMap<String, Vec<(String, Cell)>> = BTreeMap::new();
    let mut dropped = 0usize;
    for row in &table.rows {
        if row[link].is_null() {
            dropped += 1;
            continue;
        }
        groups
            .entry(row[link].to_string())
            .or_default()
            .push((row[time].to_string(), row[price].clone()));
    }

    if dropped > 0 {
        debug!(dropped, "skipped price rows without a link");
    }

    Ok(groups
        .into_iter()
        .map(|(link, time_price)| PriceHistoryEntry { link, time_price })
        .collect())
}
