use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while running a query against the listing store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid size bound {0:?}: expected a number")]
    InvalidBound(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query worker failed: {0}")]
    Worker(String),
}

/// Errors raised when a result table does not have the expected shape.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing expected column `{0}`")]
    MissingColumn(&'static str),

    #[error("column `{column}` in row {row} is not numeric")]
    NotNumeric { column: &'static str, row: usize },

    #[error("index value {0:?} is not unique")]
    DuplicateIndex(String),
}

/// Errors raised while serializing an export.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any failure along the query-to-export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl ExportError {
    /// Stable name reported as `error_type` in the error envelope
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Execution(_) => "ExecutionError",
            ExportError::Transform(_) => "TransformError",
            ExportError::Encoding(_) => "EncodingError",
        }
    }

    /// Kind, message and every underlying cause, one per line
    pub fn trace(&self) -> String {
        let mut trace = format!("{}: {}", self.kind(), self);
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}
