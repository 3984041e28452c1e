//! Approval workflow routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::approval;
use crate::state::AppState;

pub fn approval_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/loan-applications/:id/submit",
            post(approval::submit_application),
        )
        .route(
            "/api/loan-applications/:id/approvals",
            get(approval::approval_history),
        )
        .route(
            "/api/loan-applications/:id/approvals/current",
            get(approval::current_approval),
        )
        .route("/api/approvals/pending", get(approval::pending_by_role))
        .route("/api/approvals/:id/approve", post(approval::approve_level))
        .route("/api/approvals/:id/reject", post(approval::reject_level))
        .route("/api/approvals/:id/request-info", post(approval::request_more_info))
}
