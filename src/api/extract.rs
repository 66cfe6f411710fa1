//! Extractors whose rejections use the API error body.

use crate::error::{AppError, ErrorCode};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body extractor.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameter extractor.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string extractor.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

const JSON_DATA_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// Field path named by a JSON data error, e.g. `status` or `task_ids`.
fn json_error_field(text: &str) -> Option<String> {
    let rest = text.strip_prefix(JSON_DATA_PREFIX)?;
    let (path, _) = rest.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
    is_path.then(|| path.to_string())
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        let mut err = AppError::new(ErrorCode::InvalidFieldValue, "Invalid request body");
        if let JsonRejection::JsonDataError(_) = &rejection {
            if let Some(field) = json_error_field(&text) {
                err = err.with_field(field);
            }
        }
        err.with_details(text)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::new(ErrorCode::InvalidFieldValue, "Invalid path parameter")
            .with_details(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new(ErrorCode::InvalidFieldValue, "Invalid query string")
            .with_details(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_taken_from_data_error_path() {
        let text = format!("{JSON_DATA_PREFIX}status: unknown variant `done`, expected one of `pending`");
        assert_eq!(json_error_field(&text).as_deref(), Some("status"));
    }

    #[test]
    fn root_level_errors_name_no_field() {
        let text = format!("{JSON_DATA_PREFIX}missing field `title` at line 1 column 2");
        assert_eq!(json_error_field(&text), None);
        assert_eq!(json_error_field("Expected request with `Content-Type: application/json`"), None);
    }
}
