//! Customer routes

use axum::{routing::get, Router};

use crate::handlers::customer;
use crate::state::AppState;

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/customers",
            get(customer::list_customers).post(customer::create_customer),
        )
        .route("/api/customers/search", get(customer::search_customers))
        .route("/api/customers/count", get(customer::count_customers))
        .route(
            "/api/customers/created-between",
            get(customer::customers_created_between),
        )
        .route("/api/customers/phone/:phone", get(customer::get_customer_by_phone))
        .route(
            "/api/customers/:id",
            get(customer::get_customer)
                .put(customer::update_customer)
                .delete(customer::delete_customer),
        )
        .route(
            "/api/customers/:id/credit-score",
            get(customer::customer_credit_score),
        )
}
