//! Request extractors.

use super::AppState;
use crate::db::models::User;
use crate::error::ApiError;
use crate::security::token;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
///
/// Verifies the token signature and expiry, then loads the user; a token for
/// a deleted or deactivated account is rejected the same as an invalid one.
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let user_id = token::verify(&state.config.auth.token_secret, token)
            .map_err(|_| ApiError::Unauthorized)?;

        let user = state
            .db
            .users()
            .find_by_id(&user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !user.is_active {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser(user))
    }
}
