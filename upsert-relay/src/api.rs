use crate::errors::{ErrorKind, RelayError};
use crate::model::SaveResult;
use serde::{Deserialize, Serialize};

/// JSON body returned to the widget for every save attempt.
///
/// ```json
/// { "success": true, "rowsInserted": 3, "message": "Saved 3 fields" }
/// { "success": false, "message": "Invalid request", "error": "duplicate field name 'subject' ..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_inserted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn saved(result: &SaveResult) -> Self {
        let noun = if result.rows_submitted == 1 {
            "field"
        } else {
            "fields"
        };
        SaveResponse {
            success: true,
            rows_inserted: Some(result.rows_submitted),
            message: Some(format!("Saved {} {noun}", result.rows_submitted)),
            error: None,
        }
    }

    pub fn failed(err: &RelayError) -> Self {
        let message = match err.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Config => "Relay is not configured",
            ErrorKind::Auth => "Could not authenticate with the marketing platform",
            ErrorKind::Upsert => "Could not save rows to the data extension",
            ErrorKind::Internal => "Internal error",
        };
        SaveResponse::failure(message, err.to_string())
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        SaveResponse {
            success: false,
            rows_inserted: None,
            message: Some(message.into()),
            error: Some(error.into()),
        }
    }
}
