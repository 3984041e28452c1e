//! API handlers

pub mod approval;
pub mod auth;
pub mod calculation;
pub mod customer;
pub mod health;
pub mod loan;
pub mod product;

pub use crate::middleware::auth::AuthenticatedUser;
