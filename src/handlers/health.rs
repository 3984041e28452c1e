use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: String,
    blacklist: &'static str,
    version: &'static str,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, database) = match db::check_health(&state.db_pool).await {
        Ok(()) => ("healthy", StatusCode::OK, "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string())
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            blacklist: state.token_service.blacklist_backend(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
