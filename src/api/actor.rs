//! Resolution of the acting user.

use super::server::AppState;
use crate::error::AppError;
use crate::types::User;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Header carrying the acting user's id.
pub const ACTOR_HEADER: &str = "x-user-id";

/// The user performing the request.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing X-User-Id header"))?;
        let user_id: i64 = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| AppError::unauthorized("Malformed X-User-Id header"))?;
        let user = state
            .db
            .get_user(user_id)?
            .ok_or_else(|| AppError::unauthorized("Unknown user"))?;
        Ok(Actor(user))
    }
}
