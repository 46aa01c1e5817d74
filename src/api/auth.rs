use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::services::schedule_store::AuthUser;
use crate::state::AppState;

/// The caller behind a verified `Authorization: Bearer <token>` header.
pub struct Caller(pub AuthUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;
        let user = state
            .auth
            .user_for_token(token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".into()))?;
        debug!(user_id = %user.id, "Caller authenticated");
        Ok(Caller(user))
    }
}
