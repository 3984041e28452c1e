//! Route definitions

mod approval;
mod auth;
mod calculation;
mod customer;
mod loan;
mod product;

use axum::{middleware, routing::get, Router};

pub use approval::approval_routes;
pub use auth::auth_routes;
pub use calculation::calculation_routes;
pub use customer::customer_routes;
pub use loan::loan_routes;
pub use product::product_routes;

use crate::handlers::health::health_check;
use crate::state::AppState;

/// Every API route behind bearer authentication, security headers and
/// request tracing. CORS and transport layers are added by the binary.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes())
        .merge(customer_routes())
        .merge(product_routes())
        .merge(loan_routes())
        .merge(approval_routes())
        .merge(calculation_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::authenticate,
        ))
        .layer(middleware::from_fn(crate::middleware::security_headers))
        .layer(middleware::from_fn(crate::middleware::request_tracing))
        .with_state(state)
}
