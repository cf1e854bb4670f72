//! Registration, login, and profile endpoints.

use super::{AppState, AuthUser};
use crate::db::models::{User, role};
use crate::db::users::{NewUser, ProfileUpdate};
use crate::error::{ApiError, ApiResult};
use crate::security::{password, token};
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: Option<String>,
    pub badge_number: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub service_number: Option<String>,
    pub rank: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    validate_registration(&request)?;

    let password_hash = password::hash_password(&request.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let user = state
        .db
        .users()
        .create(NewUser {
            email: &request.email,
            username: &request.username,
            password_hash: &password_hash,
            role: request.role.as_deref().unwrap_or(role::POLICE),
            badge_number: request.badge_number.as_deref(),
            department: request.department.as_deref(),
            phone: request.phone.as_deref(),
            service_number: request.service_number.as_deref(),
            rank: request.rank.as_deref(),
        })
        .await
        .map_err(|e| match e {
            crate::db::DbError::EmailExists(_) => {
                ApiError::BadRequest("email already registered".into())
            }
            other => other.into(),
        })?;

    Ok(Json(user))
}

fn validate_registration(request: &RegisterRequest) -> ApiResult<()> {
    if !request.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".into()));
    }
    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }
    if request.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if let Some(role) = request.role.as_deref()
        && ![role::ADMIN, role::POLICE, role::COMMUNITY, role::TRAINEE].contains(&role)
    {
        return Err(ApiError::BadRequest(format!("unknown role: {role}")));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state.db.users().find_by_email(&request.email).await?;

    // Same rejection for unknown email and wrong password.
    let user = user
        .filter(|u| password::verify_password(&request.password, &u.password_hash))
        .ok_or(ApiError::Unauthorized)?;

    let access_token = token::issue(
        &state.config.auth.token_secret,
        &user.id,
        state.config.auth.token_ttl_minutes,
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub service_number: Option<String>,
    pub rank: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<User>> {
    let updated = state
        .db
        .users()
        .update_profile(
            &user.id,
            ProfileUpdate {
                username: request.username,
                phone: request.phone,
                service_number: request.service_number,
                rank: request.rank,
                department: request.department,
                status: request.status,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(updated))
}
