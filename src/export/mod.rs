pub mod encode;
pub mod transform;

pub use encode::{Attachment, Format};

use crate::error::ExportError;
use crate::models::ResultTable;
use crate::query::QueryKind;

/// Reshape a result table for `kind` and encode it as `format`
pub fn render(kind: QueryKind, format: Format, table: ResultTable) -> Result<Vec<u8>, ExportError> {
    let body = match (kind, format) {
        (QueryKind::Latest | QueryKind::Entire, Format::Csv) => encode::table_csv(&table)?,
        // Latest keeps native JSON types; see DESIGN.md
        (QueryKind::Latest, Format::Json) => encode::table_json(&table)?,
        (QueryKind::Entire, Format::Json) => {
            encode::table_json(&transform::stringify_columns(table))?
        }
        (QueryKind::PricesOverTime, Format::Csv) => {
            let table = transform::stringify_column(table, transform::SERIES_TIME_COLUMN)?;
            encode::table_csv(&table)?
        }
        (QueryKind::PricesOverTime, Format::Json) => {
            encode::series_json(&transform::price_series(table)?)?
        }
        (QueryKind::PriceChange, Format::Csv) => {
            encode::history_csv(&transform::price_history(&table)?)?
        }
        (QueryKind::PriceChange, Format::Json) => {
            encode::history_json(&transform::price_history(&table)?)?
        }
    };
    Ok(body)
}
