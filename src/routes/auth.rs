//! Authentication route handlers
//!
//! Login, token refresh and the current user. Accounts are created with the
//! `create-user` command; there is no self-registration.

use crate::auth::{create_tokens, refresh_tokens, verify_password, TokenPair, Viewer};
use crate::error::{ApiResult, AppError};
use crate::models::{LoginRequest, RefreshRequest, UserResponse};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .filter(|user| verify_password(&req.password, &user.password_hash))
        .ok_or_else(|| {
            warn!(email = %req.email, "Failed login");
            AppError::Unauthorized("Invalid email or password".to_string())
        })?;

    let tokens = create_tokens(&user, &state.jwt_secret)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse {
        success: true,
        user: UserResponse::from(&user),
        tokens,
    }))
}

/// POST /api/auth/refresh
///
/// Permissions and groups are read again so a refreshed token reflects
/// changes made since login.
pub async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = refresh_tokens(&req.refresh_token, &state.jwt_secret)?;
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(TokenResponse {
        success: true,
        tokens: create_tokens(&user, &state.jwt_secret)?,
    }))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<SharedState>,
    viewer: Viewer,
) -> ApiResult<Json<MeResponse>> {
    let user_id = viewer
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        success: true,
        user: UserResponse::from(&user),
    }))
}
