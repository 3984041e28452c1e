//! Loan application HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::loan::{
    ApproveApplicationQuery, BranchTotalResponse, CreateLoanApplicationRequest,
    LoanApplicationResponse, RejectApplicationQuery, ScheduleQuery, StatusFilter,
    StatusSinceQuery, UpdateStatusQuery,
};
use crate::models::CountResponse;
use crate::services::EmiCalculation;
use crate::state::AppState;

type ApplicationList = Json<Vec<LoanApplicationResponse>>;

fn responses(applications: Vec<crate::loan::LoanApplication>) -> ApplicationList {
    Json(applications.into_iter().map(LoanApplicationResponse::from).collect())
}

/// Explicit actor parameter, falling back to the caller
fn actor(explicit: Option<String>, user: &AuthenticatedUser) -> String {
    explicit
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| user.username.clone())
}

/// POST /api/loan-applications
pub async fn create_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateLoanApplicationRequest>,
) -> Result<(StatusCode, Json<LoanApplicationResponse>), ApiError> {
    tracing::debug!(actor = %user.username, customer_id = req.customer_id, "Creating loan application");
    let application = state.loan_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(application.into())))
}

/// GET /api/loan-applications
pub async fn list_applications(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<ApplicationList, ApiError> {
    Ok(responses(state.loan_service.list().await?))
}

/// GET /api/loan-applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<LoanApplicationResponse>, ApiError> {
    Ok(Json(state.loan_service.get(id).await?.into()))
}

/// GET /api/loan-applications/number/:application_no
pub async fn get_application_by_number(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(application_no): Path<String>,
) -> Result<Json<LoanApplicationResponse>, ApiError> {
    Ok(Json(
        state.loan_service.get_by_number(&application_no).await?.into(),
    ))
}

/// GET /api/loan-applications/customer/:customer_id
pub async fn list_by_customer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(customer_id): Path<i64>,
) -> Result<ApplicationList, ApiError> {
    Ok(responses(state.loan_service.list_by_customer(customer_id).await?))
}

/// GET /api/loan-applications/status?statusCode=
pub async fn list_by_status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(filter): Query<StatusFilter>,
) -> Result<ApplicationList, ApiError> {
    Ok(responses(
        state.loan_service.list_by_status(filter.status_code).await?,
    ))
}

/// GET /api/loan-applications/count?statusCode=&since=
pub async fn count_by_status_since(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<StatusSinceQuery>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state
        .loan_service
        .count_by_status_since(query.status_code, query.since)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/loan-applications/branch/:branch_id/total-approved
pub async fn total_approved_by_branch(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(branch_id): Path<i64>,
) -> Result<Json<BranchTotalResponse>, ApiError> {
    let total = state.loan_service.total_approved_by_branch(branch_id).await?;
    Ok(Json(BranchTotalResponse {
        branch_id,
        total_approved_amount: total,
    }))
}

/// POST /api/loan-applications/:id/approve?approvedAmount=&approvedBy=
pub async fn approve_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ApproveApplicationQuery>,
) -> Result<Json<LoanApplicationResponse>, ApiError> {
    let actor = actor(query.approved_by, &user);
    let application = state
        .loan_service
        .approve(id, query.approved_amount, &actor)
        .await?;
    Ok(Json(application.into()))
}

/// POST /api/loan-applications/:id/reject?rejectionReason=&rejectedBy=
pub async fn reject_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<RejectApplicationQuery>,
) -> Result<Json<LoanApplicationResponse>, ApiError> {
    if query.rejection_reason.trim().is_empty() {
        return Err(ApiError::Validation("Rejection reason is required".to_string()));
    }
    let actor = actor(query.rejected_by, &user);
    let application = state
        .loan_service
        .reject(id, &query.rejection_reason, &actor)
        .await?;
    Ok(Json(application.into()))
}

/// PUT /api/loan-applications/:id/status?statusCode=&remarks=
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<UpdateStatusQuery>,
) -> Result<Json<LoanApplicationResponse>, ApiError> {
    let application = state
        .loan_service
        .update_status(id, query.status_code, query.remarks.as_deref(), &user.username)
        .await?;
    Ok(Json(application.into()))
}

/// DELETE /api/loan-applications/:id
pub async fn delete_application(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.loan_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/loan-applications/:id/schedule?startDate=
pub async fn repayment_schedule(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<EmiCalculation>, ApiError> {
    Ok(Json(
        state
            .loan_service
            .repayment_schedule(id, query.start_date)
            .await?,
    ))
}
