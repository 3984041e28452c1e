//! Authentication module
//!
//! - JWT access/refresh tokens with a revocation blacklist
//! - bcrypt password storage
//! - Registration, login, refresh rotation and logout

pub mod blacklist;
mod jwt;
mod password;
mod service;

pub use blacklist::{connect_blacklist, BlacklistStore, CacheError, MemoryBlacklist, RedisBlacklist};
pub use jwt::{blacklist_key, Claims, IssuedToken, TokenError, TokenKind, TokenService};
pub use password::{hash_password, hash_token, verify_password};
pub use service::AuthService;
