use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::personality::repository::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Errors produced while building a report for a result id.
///
/// `Clone` because a single in-flight computation hands the same outcome to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("Result {0} not found")]
    UnknownResult(Uuid),

    #[error("Answers have not been submitted for result {0}")]
    AnswersMissing(Uuid),

    #[error("Demographics have not been submitted for result {0}")]
    DemographicsMissing(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Report computation aborted: {0}")]
    Aborted(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Report(ReportError::UnknownResult(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
            AppError::Report(ReportError::AnswersMissing(_)) => {
                (StatusCode::BAD_REQUEST, "ANSWERS_MISSING", self.to_string())
            }
            AppError::Report(ReportError::DemographicsMissing(_)) => {
                (StatusCode::BAD_REQUEST, "DEMOGRAPHICS_MISSING", self.to_string())
            }
            AppError::Report(e) => {
                tracing::error!("Report error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "REPORT_ERROR",
                    "The report could not be produced".to_string(),
                )
            }
            AppError::Store(StoreError::Missing(id)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", format!("Record {id} not found"))
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
