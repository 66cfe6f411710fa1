//! User endpoints.

use super::extract::ApiJson;
use super::server::AppState;
use crate::error::AppResult;
use crate::types::{NewUser, User};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

pub(super) async fn create_user(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.db.create_user(input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.db.list_users()?))
}
