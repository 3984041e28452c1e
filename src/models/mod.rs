//! Shared data models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};

pub mod auth;
pub use auth::*;

/// User account row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    /// bcrypt hash
    pub password: String,
    pub role_code: String,
    pub status_code: UserStatus,
    pub branch_id: Option<i64>,
    /// SHA-256 digest of the live refresh token
    pub refresh_token: Option<String>,
    pub refresh_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status_code == UserStatus::Active
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

/// Public projection of a user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role_code: String,
    pub status_code: UserStatus,
    pub branch_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            role_code: user.role_code,
            status_code: user.status_code,
            branch_id: user.branch_id,
            created_at: user.created_at,
        }
    }
}

/// Wrapper for list endpoints that report a count alongside the items
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}
