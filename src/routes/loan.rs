//! Loan application routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::loan;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/loan-applications",
            get(loan::list_applications).post(loan::create_application),
        )
        .route("/api/loan-applications/status", get(loan::list_by_status))
        .route("/api/loan-applications/count", get(loan::count_by_status_since))
        .route(
            "/api/loan-applications/number/:application_no",
            get(loan::get_application_by_number),
        )
        .route(
            "/api/loan-applications/customer/:customer_id",
            get(loan::list_by_customer),
        )
        .route(
            "/api/loan-applications/branch/:branch_id/total-approved",
            get(loan::total_approved_by_branch),
        )
        .route(
            "/api/loan-applications/:id",
            get(loan::get_application).delete(loan::delete_application),
        )
        .route("/api/loan-applications/:id/approve", post(loan::approve_application))
        .route("/api/loan-applications/:id/reject", post(loan::reject_application))
        .route("/api/loan-applications/:id/status", put(loan::update_status))
        .route("/api/loan-applications/:id/schedule", get(loan::repayment_schedule))
}
