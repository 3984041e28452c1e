//! Calculator routes

use axum::{routing::post, Router};

use crate::handlers::calculation;
use crate::state::AppState;

pub fn calculation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/calculations/emi", post(calculation::emi))
        .route("/api/calculations/simple-interest", post(calculation::simple_interest))
        .route("/api/calculations/compound-interest", post(calculation::compound_interest))
        .route("/api/calculations/processing-fee", post(calculation::processing_fee))
        .route("/api/calculations/late-penalty", post(calculation::late_penalty))
        .route("/api/calculations/ltv", post(calculation::ltv))
}
