//! Product catalogue routes (read-only)

use axum::{routing::get, Router};

use crate::handlers::product;
use crate::state::AppState;

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(product::list_products))
        .route("/api/products/active", get(product::list_active_products))
        .route("/api/products/search", get(product::search_products))
        .route("/api/products/for-amount", get(product::products_for_amount))
        .route("/api/products/count-active", get(product::count_active_products))
        .route("/api/products/code/:code", get(product::get_product_by_code))
        .route("/api/products/type/:product_type", get(product::list_products_by_type))
        .route("/api/products/:id", get(product::get_product))
}
