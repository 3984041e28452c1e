use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Customer with totals over their loan applications
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: i64,
    pub name_en: String,
    pub name_kh: Option<String>,
    pub phone: Option<String>,
    pub address_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub total_loan_applications: i64,
    pub active_loans: i64,
    pub total_loan_amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255, message = "English name is required"))]
    pub name_en: String,
    #[validate(length(max = 255))]
    pub name_kh: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Phone must not be blank"))]
    pub phone: Option<String>,
    pub address_id: Option<i64>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 255, message = "English name must not be blank"))]
    pub name_en: Option<String>,
    #[validate(length(max = 255))]
    pub name_kh: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Phone must not be blank"))]
    pub phone: Option<String>,
    pub address_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerSearch {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedBetween {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScoreResponse {
    pub customer_id: i64,
    pub credit_score: i32,
}
