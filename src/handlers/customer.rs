//! Customer HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::AuthenticatedUser;
use crate::customer::{
    CreateCustomerRequest, CreatedBetween, CreditScoreResponse, CustomerResponse, CustomerSearch,
    UpdateCustomerRequest,
};
use crate::error::ApiError;
use crate::models::CountResponse;
use crate::state::AppState;

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let customer = state.customer_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/customers/:id
pub async fn get_customer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CustomerResponse>, ApiError> {
    Ok(Json(state.customer_service.get(id).await?))
}

/// GET /api/customers
pub async fn list_customers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    Ok(Json(state.customer_service.list().await?))
}

/// PUT /api/customers/:id
pub async fn update_customer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    Ok(Json(state.customer_service.update(id, req).await?))
}

/// DELETE /api/customers/:id
pub async fn delete_customer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.customer_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/customers/search?name=
pub async fn search_customers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<CustomerSearch>,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    Ok(Json(state.customer_service.search_by_name(&query.name).await?))
}

/// GET /api/customers/phone/:phone
pub async fn get_customer_by_phone(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(phone): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    Ok(Json(state.customer_service.get_by_phone(&phone).await?))
}

/// GET /api/customers/count
pub async fn count_customers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.customer_service.count().await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/customers/created-between?from=&to=
pub async fn customers_created_between(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(range): Query<CreatedBetween>,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    Ok(Json(
        state
            .customer_service
            .created_between(range.from, range.to)
            .await?,
    ))
}

/// GET /api/customers/:id/credit-score
pub async fn customer_credit_score(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CreditScoreResponse>, ApiError> {
    Ok(Json(state.customer_service.credit_score(id).await?))
}
