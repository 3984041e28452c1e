use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;

/// Loan application lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Draft,
    Submitted,
    UnderReview,
    RequiresMoreInfo,
    Approved,
    Rejected,
    Disbursed,
    Active,
    Closed,
    Defaulted,
    Cancelled,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 11] = [
        LoanStatus::Draft,
        LoanStatus::Submitted,
        LoanStatus::UnderReview,
        LoanStatus::RequiresMoreInfo,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::Disbursed,
        LoanStatus::Active,
        LoanStatus::Closed,
        LoanStatus::Defaulted,
        LoanStatus::Cancelled,
    ];

    /// States reachable through an explicit status update
    pub fn allowed_next(self) -> &'static [LoanStatus] {
        use LoanStatus::*;
        match self {
            Draft => &[Submitted, Cancelled],
            Submitted => &[UnderReview, Cancelled],
            UnderReview => &[Approved, Rejected, RequiresMoreInfo],
            RequiresMoreInfo => &[UnderReview, Cancelled],
            Approved => &[Disbursed, Cancelled],
            Disbursed => &[Active, Cancelled],
            Active => &[Closed, Defaulted],
            Rejected | Closed | Defaulted | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn ensure_transition(self, next: LoanStatus) -> Result<(), ApiError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ApiError::Validation(format!(
                "Invalid status transition from {} to {}",
                self.code(),
                next.code()
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn code(self) -> &'static str {
        match self {
            LoanStatus::Draft => "DRAFT",
            LoanStatus::Submitted => "SUBMITTED",
            LoanStatus::UnderReview => "UNDER_REVIEW",
            LoanStatus::RequiresMoreInfo => "REQUIRES_MORE_INFO",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Closed => "CLOSED",
            LoanStatus::Defaulted => "DEFAULTED",
            LoanStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LoanStatus::Draft => "Application is being prepared",
            LoanStatus::Submitted => "Application submitted for review",
            LoanStatus::UnderReview => "Application is under review",
            LoanStatus::RequiresMoreInfo => "Additional information required",
            LoanStatus::Approved => "Application approved",
            LoanStatus::Rejected => "Application rejected",
            LoanStatus::Disbursed => "Loan amount disbursed",
            LoanStatus::Active => "Loan is active",
            LoanStatus::Closed => "Loan closed",
            LoanStatus::Defaulted => "Loan defaulted",
            LoanStatus::Cancelled => "Application cancelled",
        }
    }
}

/// Loan application row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanApplication {
    pub id: i64,
    pub application_no: String,
    pub customer_id: i64,
    pub product_id: i64,
    pub branch_id: Option<i64>,
    /// Applied amount until approval, approved amount afterwards
    pub loan_amount: Decimal,
    pub tenure_month: i32,
    pub interest_rate: Decimal,
    pub processing_fee: Decimal,
    pub status_code: LoanStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanApplicationRequest {
    pub customer_id: i64,
    pub product_id: i64,
    pub branch_id: Option<i64>,
    pub loan_amount: Decimal,
    /// Defaults to the product tenure
    #[validate(range(min = 1, max = 600, message = "Tenure must be between 1 and 600 months"))]
    pub tenure_month: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveApplicationQuery {
    pub approved_amount: Decimal,
    pub approved_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectApplicationQuery {
    pub rejection_reason: String,
    pub rejected_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusQuery {
    pub status_code: LoanStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFilter {
    pub status_code: LoanStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSinceQuery {
    pub status_code: LoanStatus,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplicationResponse {
    pub id: i64,
    pub application_no: String,
    pub customer_id: i64,
    pub product_id: i64,
    pub branch_id: Option<i64>,
    pub loan_amount: Decimal,
    pub tenure_month: i32,
    pub interest_rate: Decimal,
    pub processing_fee: Decimal,
    pub status_code: LoanStatus,
    pub status_description: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<LoanApplication> for LoanApplicationResponse {
    fn from(app: LoanApplication) -> Self {
        Self {
            id: app.id,
            application_no: app.application_no,
            customer_id: app.customer_id,
            product_id: app.product_id,
            branch_id: app.branch_id,
            loan_amount: app.loan_amount,
            tenure_month: app.tenure_month,
            interest_rate: app.interest_rate,
            processing_fee: app.processing_fee,
            status_code: app.status_code,
            status_description: app.status_code.description(),
            created_at: app.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTotalResponse {
    pub branch_id: i64,
    pub total_approved_amount: Decimal,
}
