use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use std::fmt;

/// Timestamp layout used when a cell is rendered as plain text
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layout used when a cell is rendered natively in JSON
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Location information for a listing; coordinates are not stored
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub city: String,
    pub area: Option<String>,
}

/// One scrape of a listing, as written by the scraper
///
/// Fields the store has no column for (description, images, raw data) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub id: String,
    pub location: Location,
    pub address: String,
    pub price: i64,
    pub rooms: f32,
    pub sqm: i32,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    /// Asking price per square meter, `None` when the size is unknown
    pub fn price_per_sqm(&self) -> Option<f64> {
        if self.sqm <= 0 {
            return None;
        }
        Some(self.price as f64 / f64::from(self.sqm))
    }
}

/// A single typed value from a query result
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell; text is accepted when it parses as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Real(r) => Some(*r),
            Cell::Text(s) => s.trim().parse().ok(),
            Cell::Null | Cell::Timestamp(_) => None,
        }
    }

    /// The string form of the cell, keeping nulls as nulls
    pub fn stringify(&self) -> Cell {
        match self {
            Cell::Null => Cell::Null,
            Cell::Text(_) => self.clone(),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(i) => write!(f, "{}", i),
            // Debug keeps the fractional part: 350000.0 rather than 350000
            Cell::Real(r) => write!(f, "{:?}", r),
            Cell::Text(s) => f.write_str(s),
            Cell::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Integer(i) => serializer.serialize_i64(*i),
            Cell::Real(r) if r.is_finite() => serializer.serialize_f64(*r),
            Cell::Real(_) => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Timestamp(ts) => {
                serializer.collect_str(&ts.format(ISO_TIMESTAMP_FORMAT))
            }
        }
    }
}

/// Materialized query result: named columns and rows of cells
///
/// Every row has exactly `columns.len()` cells. The row index is the row position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One bucket of the price-over-time series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: String,
    pub average_price_sqm: Option<f64>,
}

/// Chronological (time, price) observations of a single listing
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistoryEntry {
    pub link: String,
    pub time_price: Vec<(String, Cell)>,
}
