//! REST API types and error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CsvError, PipelineError, ServerError, StoreError};

/// Query string for report retrieval: `?output=json|csv|html`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub output: Option<String>,
}

/// Multipart fields of a reconciliation upload.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub source_file: Option<Vec<u8>>,
    pub target_file: Option<Vec<u8>>,
    pub output_format: Option<String>,
}

impl UploadForm {
    /// Both files, or the list of missing field names.
    pub fn files(self) -> Result<(Vec<u8>, Vec<u8>, Option<String>), Vec<&'static str>> {
        match (self.source_file, self.target_file) {
            (Some(source), Some(target)) => Ok((source, target, self.output_format)),
            (source, target) => {
                let mut missing = Vec::new();
                if source.is_none() {
                    missing.push("source_file");
                }
                if target.is_none() {
                    missing.push("target_file");
                }
                Err(missing)
            }
        }
    }
}

/// Service health payload
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub reports: usize,
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

/// Body for a lookup miss.
pub fn not_found_response() -> Value {
    json!({ "detail": "Report not found." })
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_)
            | ServerError::Csv(_)
            | ServerError::Pipeline(PipelineError::Csv { .. }) => StatusCode::BAD_REQUEST,
            ServerError::Reconcile(_) | ServerError::Pipeline(PipelineError::Reconcile(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Format(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ServerError::Store(StoreError::NotFound(_)) => not_found_response(),
            ServerError::Csv(CsvError::IoError(_)) => error_response("Failed to read upload"),
            other => error_response(&other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::Store(StoreError::NotFound("9".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ServerError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::Reconcile(ReconcileError::Cancelled { phase: "comparison" }).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_missing_upload_fields() {
        let form = UploadForm { source_file: Some(b"id\n".to_vec()), ..Default::default() };
        assert_eq!(form.files().unwrap_err(), vec!["target_file"]);

        let form = UploadForm::default();
        assert_eq!(form.files().unwrap_err(), vec!["source_file", "target_file"]);
    }

    #[test]
    fn test_error_body() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert_eq!(not_found_response()["detail"], "Report not found.");
    }
}
