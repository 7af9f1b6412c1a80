//! Account handlers.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::auth::{RefreshTokenRequest, SignInRequest, SignUpRequest};
use crate::middleware::AuthUser;
use crate::models::{User, UserPatch};
use crate::services::TokenPair;
use crate::AppState;

/// POST /v1/public/auth/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<TokenPair>), AppError> {
    let tokens = state.auth.sign_up(req).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /v1/public/auth/sign-in
pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<TokenPair>, AppError> {
    Ok(Json(state.auth.sign_in(req).await?))
}

/// POST /v1/public/auth/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AppError> {
    Ok(Json(state.auth.refresh_token(req).await?))
}

/// GET /v1/protected/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>, AppError> {
    Ok(Json(state.auth.me(user.user_id).await?))
}

/// PUT /v1/protected/me
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.auth.update_me(user.user_id, patch).await?))
}
