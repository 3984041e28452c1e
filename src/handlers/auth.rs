//! Authentication HTTP handlers

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::models::{
    AuthTokensResponse, LoginRequest, LogoutRequest, MessageResponse, RefreshTokenRequest,
    RegisterRequest, UserResponse,
};
use crate::state::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth_service.register(req).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth_service.authenticate(req).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth_service.refresh(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout
///
/// Takes the refresh token from the body and the access token from the
/// `Authorization` header; either one is enough.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let access_token = bearer_token(&headers);

    let response = state
        .auth_service
        .logout(req.refresh_token.as_deref(), access_token.as_deref())
        .await?;
    Ok(Json(response))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state.auth_service.profile(&user.username).await?;
    Ok(Json(profile))
}

#[derive(Serialize)]
pub struct AuthHealth {
    status: &'static str,
    service: &'static str,
    blacklist: &'static str,
}

/// GET /api/auth/health
pub async fn health(State(state): State<AppState>) -> Json<AuthHealth> {
    Json(AuthHealth {
        status: "UP",
        service: "auth",
        blacklist: state.token_service.blacklist_backend(),
    })
}
