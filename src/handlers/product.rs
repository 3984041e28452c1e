//! Product HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::CountResponse;
use crate::product::{AmountQuery, Product, ProductSearch};
use crate::state::AppState;

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.product_service.list().await?))
}

/// GET /api/products/active
pub async fn list_active_products(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.product_service.list_active().await?))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.product_service.get(id).await?))
}

/// GET /api/products/code/:code
pub async fn get_product_by_code(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(code): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.product_service.get_by_code(&code).await?))
}

/// GET /api/products/type/:product_type
pub async fn list_products_by_type(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(product_type): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.product_service.list_by_type(&product_type).await?))
}

/// GET /api/products/search?q=
pub async fn search_products(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ProductSearch>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.product_service.search(&query.q).await?))
}

/// GET /api/products/for-amount?amount=
pub async fn products_for_amount(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<AmountQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.product_service.for_amount(query.amount).await?))
}

/// GET /api/products/count-active
pub async fn count_active_products(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.product_service.count_active().await?;
    Ok(Json(CountResponse { count }))
}
