//! Loan calculators exposed over HTTP

use axum::{extract::State, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::services::{
    calculate_compound_interest, calculate_emi, calculate_late_payment_penalty, calculate_ltv,
    calculate_processing_fee, calculate_simple_interest, EmiCalculation, InterestCalculation,
};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmiRequest {
    pub principal: Decimal,
    pub annual_interest_rate: Decimal,
    #[validate(range(min = 1, max = 600, message = "Tenure must be between 1 and 600 months"))]
    pub tenure_months: u32,
    pub first_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRequest {
    pub principal: Decimal,
    pub annual_interest_rate: Decimal,
    pub time_years: Decimal,
}

/// Percentage and minimum default to the configured fee policy
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingFeeRequest {
    pub amount: Decimal,
    pub percentage: Option<Decimal>,
    pub min_fee: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatePenaltyRequest {
    pub overdue_amount: Option<Decimal>,
    pub fixed_penalty: Option<Decimal>,
    pub percentage_penalty: Option<Decimal>,
    pub days_late: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtvRequest {
    pub loan_amount: Decimal,
    pub property_value: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeResponse {
    pub amount: Decimal,
    pub processing_fee: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyResponse {
    pub penalty: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LtvResponse {
    pub loan_amount: Decimal,
    pub property_value: Decimal,
    pub ltv_ratio: Decimal,
}

/// POST /api/calculations/emi
pub async fn emi(
    _user: AuthenticatedUser,
    Json(req): Json<EmiRequest>,
) -> Result<Json<EmiCalculation>, ApiError> {
    req.validate()?;
    let calculation = calculate_emi(
        req.principal,
        req.annual_interest_rate,
        req.tenure_months,
        req.first_payment_date,
    )?;
    Ok(Json(calculation))
}

/// POST /api/calculations/simple-interest
pub async fn simple_interest(
    _user: AuthenticatedUser,
    Json(req): Json<InterestRequest>,
) -> Result<Json<InterestCalculation>, ApiError> {
    Ok(Json(calculate_simple_interest(
        req.principal,
        req.annual_interest_rate,
        req.time_years,
    )?))
}

/// POST /api/calculations/compound-interest
pub async fn compound_interest(
    _user: AuthenticatedUser,
    Json(req): Json<InterestRequest>,
) -> Result<Json<InterestCalculation>, ApiError> {
    Ok(Json(calculate_compound_interest(
        req.principal,
        req.annual_interest_rate,
        req.time_years,
    )?))
}

/// POST /api/calculations/processing-fee
pub async fn processing_fee(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(req): Json<ProcessingFeeRequest>,
) -> Result<Json<FeeResponse>, ApiError> {
    let policy = state.loan_service.fee_policy();
    let fee = calculate_processing_fee(
        req.amount,
        req.percentage.unwrap_or(policy.percentage),
        req.min_fee.unwrap_or(policy.min_fee),
    )?;
    Ok(Json(FeeResponse {
        amount: req.amount,
        processing_fee: fee,
    }))
}

/// POST /api/calculations/late-penalty
pub async fn late_penalty(
    _user: AuthenticatedUser,
    Json(req): Json<LatePenaltyRequest>,
) -> Result<Json<PenaltyResponse>, ApiError> {
    let penalty = calculate_late_payment_penalty(
        req.overdue_amount,
        req.fixed_penalty,
        req.percentage_penalty,
        req.days_late,
    )?;
    Ok(Json(PenaltyResponse { penalty }))
}

/// POST /api/calculations/ltv
pub async fn ltv(
    _user: AuthenticatedUser,
    Json(req): Json<LtvRequest>,
) -> Result<Json<LtvResponse>, ApiError> {
    let ratio = calculate_ltv(req.loan_amount, req.property_value)?;
    Ok(Json(LtvResponse {
        loan_amount: req.loan_amount,
        property_value: req.property_value,
        ltv_ratio: ratio,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emi_request_bounds_tenure() {
        let oversized: EmiRequest = serde_json::from_str(
            r#"{"principal":"1000","annualInterestRate":"0","tenureMonths":4294967295}"#,
        )
        .unwrap();
        assert!(oversized.validate().is_err());

        let zero: EmiRequest = serde_json::from_str(
            r#"{"principal":"1000","annualInterestRate":"5","tenureMonths":0}"#,
        )
        .unwrap();
        assert!(zero.validate().is_err());

        let ok: EmiRequest = serde_json::from_str(
            r#"{"principal":"1000","annualInterestRate":"5","tenureMonths":600}"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());
    }
}
