//! Bearer authentication
//!
//! [`authenticate`] resolves the request principal once per request and
//! stores it in the request extensions. Handlers pull it out again with the
//! [`AuthenticatedUser`] extractor, which is where missing credentials turn
//! into a 401.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::Utc;

use crate::auth::TokenKind;
use crate::error::ApiError;
use crate::models::UserStatus;
use crate::state::AppState;

const PUBLIC_PATHS: [&str; 6] = [
    "/api/auth/login",
    "/api/auth/refresh",
    "/api/auth/register",
    "/api/auth/logout",
    "/api/auth/health",
    "/error",
];

const PUBLIC_PREFIXES: [&str; 3] = ["/swagger", "/v3/api-docs", "/webjars"];

/// Paths served without looking at credentials
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|prefix| {
            path.strip_prefix(prefix)
                .map(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(false)
        })
}

/// Raw bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
}

/// Principal bound to a request by [`authenticate`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
    pub role_code: String,
    pub branch_id: Option<i64>,
    pub status: UserStatus,
}

/// Resolve the bearer token into an [`AuthenticatedUser`].
///
/// Revoked and expired tokens are refused outright. Any other problem with
/// the token leaves the request anonymous.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let token = match bearer_token(request.headers()) {
        Some(token) => token,
        None => return next.run(request).await,
    };

    if state.token_service.is_blacklisted(&token).await {
        tracing::warn!(path = %request.uri().path(), "Rejected revoked token");
        return ApiError::TokenRevoked.into_response();
    }

    let claims = match state.token_service.parse(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unverifiable bearer token");
            return next.run(request).await;
        }
    };

    if claims.is_expired(Utc::now()) {
        tracing::debug!(sub = %claims.sub, "Rejected expired token");
        return ApiError::TokenExpired.into_response();
    }

    if claims.token_type != TokenKind::Access {
        tracing::warn!(sub = %claims.sub, "Refresh token presented as bearer credential");
        return next.run(request).await;
    }

    let user = match state.auth_service.find_by_username(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(sub = %claims.sub, "Token subject no longer exists");
            return next.run(request).await;
        }
        Err(e) => return e.into_response(),
    };

    // signature, expiry and blacklist were all checked above
    match claims.ensure_subject(&user.username) {
        Ok(()) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user_id: user.id,
                username: user.username,
                role_code: user.role_code,
                branch_id: user.branch_id,
                status: user.status_code,
            });
        }
        Err(e) => tracing::warn!(error = %e, sub = %claims.sub, "Bearer token rejected"),
    }

    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::AuthFailed("Authentication required".to_string()))?;

        if user.status != UserStatus::Active {
            return Err(ApiError::Forbidden("User account is not active".to_string()));
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/auth/login"));
        assert!(is_public_path("/api/auth/logout"));
        assert!(is_public_path("/swagger"));
        assert!(is_public_path("/swagger/index.html"));
        assert!(is_public_path("/v3/api-docs/openapi.json"));
        assert!(!is_public_path("/api/auth/me"));
        assert!(!is_public_path("/swaggerish"));
        assert!(!is_public_path("/api/loan-applications"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&headers), None);
    }
}
