//! Mapping of errors onto HTTP responses.

use crate::error::{AppError, ErrorCode};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::MissingRequiredField
        | ErrorCode::InvalidFieldValue
        | ErrorCode::AlreadyGrouped
        | ErrorCode::IsSuperTask
        | ErrorCode::NotSuperTask
        | ErrorCode::NotGrouped
        | ErrorCode::InvalidState => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::TaskNotFound | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
        ErrorCode::DatabaseError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.code);
        // Persistence details stay in the log
        let body = if self.code.is_internal() {
            error!(code = ?self.code, error = %self.message, "Request failed");
            AppError::new(self.code, "Something went wrong, please try again")
        } else {
            self
        };
        (status, Json(json!({ "error": body }))).into_response()
    }
}
