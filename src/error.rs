//! Structured error types for API responses.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Caller identity
    Unauthorized,
    Forbidden,

    // Not found errors
    TaskNotFound,
    UserNotFound,

    // State conflicts
    AlreadyGrouped,
    IsSuperTask,
    NotSuperTask,
    NotGrouped,
    InvalidState,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Whether the error comes from the server side rather than the request.
    pub fn is_internal(self) -> bool {
        matches!(self, ErrorCode::DatabaseError | ErrorCode::InternalError)
    }
}

/// Structured error surfaced to API callers.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn unauthorized(reason: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, reason)
    }

    pub fn forbidden(reason: &str) -> Self {
        Self::new(ErrorCode::Forbidden, reason)
    }

    pub fn task_not_found(task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn task_identifier_not_found(identifier: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", identifier),
        )
    }

    pub fn super_task_not_found(super_task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Super task not found: {}", super_task_id),
        )
    }

    pub fn user_not_found(user_id: i64) -> Self {
        Self::new(
            ErrorCode::UserNotFound,
            format!("User not found: {}", user_id),
        )
    }

    pub fn already_grouped(task_ref: &str, parent_id: i64) -> Self {
        Self::new(
            ErrorCode::AlreadyGrouped,
            format!(
                "Task {} already belongs to super task {}",
                task_ref, parent_id
            ),
        )
    }

    pub fn is_super_task(task_ref: &str) -> Self {
        Self::new(
            ErrorCode::IsSuperTask,
            format!("Task {} is itself a super task and cannot be grouped", task_ref),
        )
    }

    pub fn not_super_task(task_ref: &str) -> Self {
        Self::new(
            ErrorCode::NotSuperTask,
            format!("Task {} is not a super task", task_ref),
        )
    }

    pub fn not_grouped(task_ref: &str) -> Self {
        Self::new(
            ErrorCode::NotGrouped,
            format!("Task {} does not belong to any super task", task_ref),
        )
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, reason)
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

// The db layer returns anyhow errors that may wrap an AppError.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => match err.downcast_ref::<rusqlite::Error>() {
                Some(db_err) => AppError::database(db_err),
                None => AppError::internal(err),
            },
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::database(err)
    }
}

/// Result type for API-facing operations.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_wrapped_app_error_survives_conversion() {
        let err: anyhow::Error = AppError::not_grouped("MKjan00126").into();
        let back = AppError::from(err);
        assert_eq!(back.code, ErrorCode::NotGrouped);
        assert!(back.message.contains("MKjan00126"));
    }

    #[test]
    fn sqlite_errors_become_database_errors() {
        let err: anyhow::Error = rusqlite::Error::QueryReturnedNoRows.into();
        let back = AppError::from(err);
        assert_eq!(back.code, ErrorCode::DatabaseError);
        assert!(back.code.is_internal());
    }

    #[test]
    fn serializes_code_in_screaming_snake_case() {
        let err = AppError::missing_field("title");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "MISSING_REQUIRED_FIELD");
        assert_eq!(value["field"], "title");
        assert!(value.get("details").is_none());
    }
}
