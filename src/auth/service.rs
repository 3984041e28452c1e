//! Authentication service
//!
//! Registration, password login, refresh-token rotation and logout. The
//! refresh token is persisted on the user row as a SHA-256 digest; only one
//! refresh token per user is live at a time.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use super::jwt::{IssuedToken, TokenError, TokenKind, TokenService};
use super::password::{hash_password, hash_token, verify_password};
use crate::error::ApiError;
use crate::models::{
    AuthTokensResponse, LoginRequest, MessageResponse, RegisterRequest, User, UserResponse,
    UserStatus,
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

struct TokenPair {
    access: IssuedToken,
    refresh: IssuedToken,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db_pool: PgPool,
    tokens: Arc<TokenService>,
    bcrypt_cost: u32,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(db_pool: PgPool, tokens: Arc<TokenService>, bcrypt_cost: u32) -> Self {
        Self {
            db_pool,
            tokens,
            bcrypt_cost,
        }
    }

    /// Create an ACTIVE user and sign them in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthTokensResponse, ApiError> {
        req.validate()?;

        let username_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM t_user WHERE username = $1)")
                .bind(&req.username)
                .fetch_one(&self.db_pool)
                .await?;
        if username_taken {
            tracing::warn!(username = %req.username, "Registration rejected: username taken");
            return Err(ApiError::Validation("Username already exists".to_string()));
        }

        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM t_user WHERE email = $1)")
                .bind(&req.email)
                .fetch_one(&self.db_pool)
                .await?;
        if email_taken {
            tracing::warn!(email = %req.email, "Registration rejected: email taken");
            return Err(ApiError::Validation("Email already exists".to_string()));
        }

        let password_hash = hash_password(req.password, self.bcrypt_cost).await?;
        let tokens = self.issue_pair(&req.username)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO t_user (
                username, email, phone, password, role_code, status_code,
                branch_id, refresh_token, refresh_token_expiry
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&password_hash)
        .bind(&req.role_code)
        .bind(UserStatus::Active)
        .bind(req.branch_id)
        .bind(hash_token(&tokens.refresh.token))
        .bind(tokens.refresh.expires_at)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        Ok(self.token_response(tokens, "Registration successful"))
    }

    /// Password login by username or email
    pub async fn authenticate(&self, req: LoginRequest) -> Result<AuthTokensResponse, ApiError> {
        req.validate()?;

        let user = match self.find_by_username_or_email(&req.username_or_email).await? {
            Some(user) => user,
            None => {
                tracing::warn!(login = %req.username_or_email, "Login failed: unknown user");
                return Err(ApiError::AuthFailed(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(req.password, user.password.clone()).await? {
            tracing::warn!(user_id = user.id, "Login failed: bad password");
            return Err(ApiError::AuthFailed(INVALID_CREDENTIALS.to_string()));
        }

        if !user.is_active() {
            tracing::warn!(user_id = user.id, "Login refused: account inactive");
            return Err(ApiError::Forbidden("User account is not active".to_string()));
        }

        let tokens = self.issue_pair(&user.username)?;

        sqlx::query(
            r#"
            UPDATE t_user
            SET refresh_token = $1, refresh_token_expiry = $2
            WHERE id = $3
            "#,
        )
        .bind(hash_token(&tokens.refresh.token))
        .bind(tokens.refresh.expires_at)
        .bind(user.id)
        .execute(&self.db_pool)
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        Ok(self.token_response(tokens, "Login successful"))
    }

    /// Rotate a refresh token into a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokensResponse, ApiError> {
        let claims = self
            .tokens
            .validate_kind(refresh_token, TokenKind::Refresh)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh rejected");
                match e {
                    TokenError::Expired => ApiError::AuthFailed("Refresh token expired".to_string()),
                    _ => ApiError::AuthFailed(INVALID_REFRESH_TOKEN.to_string()),
                }
            })?;

        let old_hash = hash_token(refresh_token);

        let user = sqlx::query_as::<_, User>("SELECT * FROM t_user WHERE refresh_token = $1")
            .bind(&old_hash)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| {
                tracing::warn!(sub = %claims.sub, "Refresh rejected: token is not the current one");
                ApiError::AuthFailed(INVALID_REFRESH_TOKEN.to_string())
            })?;

        match user.refresh_token_expiry {
            Some(expiry) if expiry > Utc::now() => {}
            _ => {
                tracing::warn!(user_id = user.id, "Refresh rejected: stored token expired");
                return Err(ApiError::AuthFailed("Refresh token expired".to_string()));
            }
        }

        if claims.sub != user.username {
            tracing::warn!(user_id = user.id, sub = %claims.sub, "Refresh rejected: subject mismatch");
            return Err(ApiError::AuthFailed(INVALID_REFRESH_TOKEN.to_string()));
        }

        if !user.is_active() {
            return Err(ApiError::Forbidden("User account is not active".to_string()));
        }

        let tokens = self.issue_pair(&user.username)?;

        // Only the caller that still holds the current token wins the rotation
        let rows_affected = sqlx::query(
            r#"
            UPDATE t_user
            SET refresh_token = $1, refresh_token_expiry = $2
            WHERE id = $3 AND refresh_token = $4
            "#,
        )
        .bind(hash_token(&tokens.refresh.token))
        .bind(tokens.refresh.expires_at)
        .bind(user.id)
        .bind(&old_hash)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tracing::warn!(user_id = user.id, "Refresh rejected: token rotated concurrently");
            return Err(ApiError::AuthFailed(INVALID_REFRESH_TOKEN.to_string()));
        }

        tracing::info!(user_id = user.id, "Refresh token rotated");

        Ok(self.token_response(tokens, "Token refreshed successfully"))
    }

    /// Drop the stored refresh token and revoke the access token, whichever are given
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<MessageResponse, ApiError> {
        let refresh_token = refresh_token.map(str::trim).filter(|t| !t.is_empty());
        let access_token = access_token.map(str::trim).filter(|t| !t.is_empty());

        if refresh_token.is_none() && access_token.is_none() {
            return Err(ApiError::Validation(
                "A refresh token or bearer access token is required".to_string(),
            ));
        }

        if let Some(token) = refresh_token {
            let cleared: Option<String> = sqlx::query_scalar(
                r#"
                UPDATE t_user
                SET refresh_token = NULL, refresh_token_expiry = NULL
                WHERE refresh_token = $1
                RETURNING username
                "#,
            )
            .bind(hash_token(token))
            .fetch_optional(&self.db_pool)
            .await?;

            match cleared {
                Some(username) => tracing::info!(username = %username, "Refresh token cleared"),
                None => tracing::debug!("Logout refresh token matched no user"),
            }
        }

        if let Some(token) = access_token {
            self.tokens.blacklist(token).await;
        }

        Ok(MessageResponse::new("Logout successful"))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM t_user WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, ApiError> {
        if let Some(user) = self.find_by_username(login).await? {
            return Ok(Some(user));
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM t_user WHERE email = $1")
            .bind(login)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(user)
    }

    pub async fn profile(&self, username: &str) -> Result<UserResponse, ApiError> {
        self.find_by_username(username)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", username)))
    }

    fn issue_pair(&self, username: &str) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access: self.tokens.issue_access_token(username)?,
            refresh: self.tokens.issue_refresh_token(username)?,
        })
    }

    fn token_response(&self, tokens: TokenPair, message: &str) -> AuthTokensResponse {
        AuthTokensResponse {
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl().num_seconds(),
            message: message.to_string(),
        }
    }
}
