use crate::error::ExportError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body returned for every failed export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_traceback: Option<String>,
}

impl ErrorEnvelope {
    /// Envelope for `err`; `context` is appended to the traceback when one is wanted
    pub fn from_error(err: &ExportError, context: Option<&str>) -> Self {
        Self {
            error_type: err.kind().to_string(),
            error_message: err.to_string(),
            error_traceback: context.map(|context| format!("{}\n  at {}", err.trace(), context)),
        }
    }
}

impl IntoResponse for ErrorEnvelope {
    // Every failure class is reported as 404
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, Json(self)).into_response()
    }
}
