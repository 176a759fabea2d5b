//! Bearer-token authentication extractor.

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

/// The authenticated user id, extracted from `Authorization: Bearer <token>`.
pub struct AuthUser(pub String);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let user_id = state
            .auth
            .resolve(token)
            .await
            .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))?;

        Ok(AuthUser(user_id))
    }
}
