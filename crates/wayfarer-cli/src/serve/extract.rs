//! Request extractors for the API.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use wayfarer_core::token;
use wayfarer_db::models::User;
use wayfarer_db::queries::users;

use super::{ApiError, AppState};

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header. Handlers get the full user row; a valid token whose user row has
/// since been deleted reads as 404, matching the per-route lookups the API
/// clients already handle.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let raw_token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Authorization header must be a Bearer token"))?;

        let claims = token::validate_token(&state.tokens, raw_token).map_err(|err| {
            tracing::debug!(error = %err, "session token rejected");
            ApiError::unauthorized("Invalid or expired session token")
        })?;

        let user = users::get_user(&state.pool, claims.user_id)
            .await
            .map_err(ApiError::internal)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        Ok(Self(user))
    }
}
