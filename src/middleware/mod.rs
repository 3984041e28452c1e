//! HTTP middleware: bearer authentication, security headers and request
//! tracing.

pub mod auth;
mod security;
mod tracing;

pub use auth::{authenticate, bearer_token, is_public_path, AuthenticatedUser};
pub use security::{hsts_header, security_headers};
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
