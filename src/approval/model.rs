use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::loan::LoanStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    MoreInfoNeeded,
}

/// Role that signs off one level of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approver_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApproverRole {
    LoanOfficer,
    BranchManager,
    RegionalDirector,
    ChiefCreditOfficer,
}

impl ApproverRole {
    pub fn for_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(ApproverRole::LoanOfficer),
            2 => Some(ApproverRole::BranchManager),
            3 => Some(ApproverRole::RegionalDirector),
            4 => Some(ApproverRole::ChiefCreditOfficer),
            _ => None,
        }
    }
}

/// One level of an application's approval chain
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: i64,
    pub loan_application_id: i64,
    pub approval_level: i32,
    pub approver_role: ApproverRole,
    pub status: ApprovalStatus,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

/// Approval opened by a workflow step, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewApproval {
    pub loan_application_id: i64,
    pub approval_level: i32,
    pub approver_role: ApproverRole,
    pub remarks: String,
    pub created_by: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApproveLevelRequest {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectLevelRequest {
    #[validate(length(min = 1, message = "Rejection reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestInfoRequest {
    #[validate(length(min = 1, message = "Requested information must be described"))]
    pub info: String,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub role: ApproverRole,
}

/// Approval plus the state of the application it belongs to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    #[serde(flatten)]
    pub approval: Approval,
    pub loan_application_status: LoanStatus,
    pub loan_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_levels() {
        assert_eq!(ApproverRole::for_level(1), Some(ApproverRole::LoanOfficer));
        assert_eq!(ApproverRole::for_level(2), Some(ApproverRole::BranchManager));
        assert_eq!(ApproverRole::for_level(3), Some(ApproverRole::RegionalDirector));
        assert_eq!(ApproverRole::for_level(4), Some(ApproverRole::ChiefCreditOfficer));
        assert_eq!(ApproverRole::for_level(0), None);
        assert_eq!(ApproverRole::for_level(5), None);
    }

    #[test]
    fn test_role_wire_names() {
        let role: ApproverRole = serde_json::from_str("\"CHIEF_CREDIT_OFFICER\"").unwrap();
        assert_eq!(role, ApproverRole::ChiefCreditOfficer);
        assert_eq!(
            serde_json::to_value(ApprovalStatus::MoreInfoNeeded).unwrap(),
            "MORE_INFO_NEEDED"
        );
    }

    #[test]
    fn test_response_flattens_approval() {
        let response = ApprovalResponse {
            approval: Approval {
                id: 7,
                loan_application_id: 3,
                approval_level: 2,
                approver_role: ApproverRole::BranchManager,
                status: ApprovalStatus::Pending,
                remarks: Some("Awaiting level 2 approval".to_string()),
                created_at: Utc::now(),
                created_by: "officer1".to_string(),
                approved_at: None,
                approved_by: None,
            },
            loan_application_status: LoanStatus::UnderReview,
            loan_amount: Decimal::new(15000000, 2),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["approverRole"], "BRANCH_MANAGER");
        assert_eq!(json["loanApplicationStatus"], "UNDER_REVIEW");
        assert_eq!(json["loanAmount"], "150000.00");
    }
}
