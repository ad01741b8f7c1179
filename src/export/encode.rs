//! CSV and JSON encoding of export structures
//!
//! Both encodings are built fully in memory and returned as an [`Attachment`],
//! which carries the content type and download filename with the body.

use crate::error::EncodingError;
use crate::models::{Cell, PriceHistoryEntry, ResultTable, TimeSeriesPoint};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Label of the leading CSV column, whatever the rows are indexed by
pub const INDEX_LABEL: &str = "index";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Csv => "text/csv",
            Format::Json => "application/json",
        }
    }
}

/// An encoded export delivered as a file download
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Attachment {
    /// Wrap `body` as `<city>_<suffix>.<ext>`
    pub fn new(format: Format, city: &str, suffix: &str, body: Vec<u8>) -> Self {
        Self {
            filename: format!("{}_{}.{}", city, suffix, format.as_str()),
            content_type: format.content_type(),
            body,
        }
    }

    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let disposition = HeaderValue::from_str(&self.content_disposition())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(self.content_type)),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.body,
        )
            .into_response()
    }
}

/// `attachment; filename=...`, adding an RFC 5987 `filename*` when the name is not plain ASCII
fn content_disposition(filename: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if plain {
        return format!("attachment; filename={}", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename={}; filename*=UTF-8''{}",
        fallback, encoded
    )
}

// ── CSV ─────────────────────────────────────────────────────────────────

fn write_csv<I>(columns: &[&str], records: I) -> Result<Vec<u8>, EncodingError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut records = records.into_iter().peekable();

    // An empty result is a header naming only the index
    if records.peek().is_none() {
        writer.write_record([INDEX_LABEL])?;
    } else {
        writer.write_record(std::iter::once(INDEX_LABEL).chain(columns.iter().copied()))?;
        for record in records {
            writer.write_record(&record)?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| EncodingError::Csv(e.into_error().into()))
}

/// Rows indexed by position, one CSV column per result column
pub fn table_csv(table: &ResultTable) -> Result<Vec<u8>, EncodingError> {
    let columns: Vec<&str> = table.columns.iter().map(String::as_str).collect();
    let records = table.rows.iter().enumerate().map(|(idx, row)| {
        std::iter::once(idx.to_string())
            .chain(row.iter().map(Cell::to_string))
            .collect::<Vec<String>>()
    });
    write_csv(&columns, records)
}

/// One CSV row per listing, indexed by link, observations embedded as JSON text
pub fn history_csv(entries: &[PriceHistoryEntry]) -> Result<Vec<u8>, EncodingError> {
    let records = entries
        .iter()
        .map(|entry| -> Result<Vec<String>, EncodingError> {
            let observations = serde_json::to_string(&Observations(&entry.time_price))?;
            Ok(vec![entry.link.clone(), observations])
        })
        .collect::<Result<Vec<_>, _>>()?;
    write_csv(&["time_price"], records)
}

// ── JSON ────────────────────────────────────────────────────────────────

/// `{"<row>": {"<column>": value, ...}, ...}`
pub fn table_json(table: &ResultTable) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(&Records(table))?)
}

/// `{"<timestamp>": price, ...}`
pub fn series_json(points: &[TimeSeriesPoint]) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(&Series(points))?)
}

/// `{"<link>": [{"<timestamp>": price}, ...], ...}`
pub fn history_json(entries: &[PriceHistoryEntry]) -> Result<Vec<u8>, EncodingError> {
    Ok(serde_json::to_vec(&History(entries))?)
}

struct Records<'a>(&'a ResultTable);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.row_count()))?;
        for (idx, cells) in self.0.rows.iter().enumerate() {
            map.serialize_entry(
                &idx.to_string(),
                &Row {
                    columns: &self.0.columns,
                    cells,
                },
            )?;
        }
        map.end()
    }
}

struct Row<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

struct Series<'a>(&'a [TimeSeriesPoint]);

impl Serialize for Series<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for point in self.0 {
            map.serialize_entry(&point.timestamp, &point.average_price_sqm)?;
        }
        map.end()
    }
}

struct History<'a>(&'a [PriceHistoryEntry]);

impl Serialize for History<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&entry.link, &Observations(&entry.time_price))?;
        }
        map.end()
    }
}

struct Observations<'a>(&'a [(String, Cell)]);

impl Serialize for Observations<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (time, price) in self.0 {
            seq.serialize_element(&Observation(time, price))?;
        }
        seq.end()
    }
}

/// A single `{time: price}` mapping
struct Observation<'a>(&'a str, &'a Cell);

impl Serialize for Observation<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}
