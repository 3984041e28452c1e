//! Approval workflow HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use super::AuthenticatedUser;
use crate::approval::{
    ApprovalResponse, ApproveLevelRequest, PendingQuery, RejectLevelRequest, RequestInfoRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/loan-applications/:id/submit
pub async fn submit_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    Ok(Json(state.approval_service.submit(id, &user.username).await?))
}

/// POST /api/approvals/:id/approve
pub async fn approve_level(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    body: Option<Json<ApproveLevelRequest>>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let response = state
        .approval_service
        .approve(id, &user.username, req.remarks.as_deref())
        .await?;
    Ok(Json(response))
}

/// POST /api/approvals/:id/reject
pub async fn reject_level(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<RejectLevelRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    req.validate()?;
    let response = state
        .approval_service
        .reject(id, &user.username, &req.reason)
        .await?;
    Ok(Json(response))
}

/// POST /api/approvals/:id/request-info
pub async fn request_more_info(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<RequestInfoRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    req.validate()?;
    let response = state
        .approval_service
        .request_more_info(id, &user.username, &req.info)
        .await?;
    Ok(Json(response))
}

/// GET /api/loan-applications/:id/approvals
pub async fn approval_history(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ApprovalResponse>>, ApiError> {
    Ok(Json(state.approval_service.history(id).await?))
}

/// GET /api/loan-applications/:id/approvals/current
pub async fn current_approval(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    Ok(Json(state.approval_service.current(id).await?))
}

/// GET /api/approvals/pending?role=
pub async fn pending_by_role(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<ApprovalResponse>>, ApiError> {
    Ok(Json(state.approval_service.pending_by_role(query.role).await?))
}
