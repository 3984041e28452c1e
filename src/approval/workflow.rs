//! Tiered approval chain over one loan application
//!
//! [`ApprovalWorkflow`] holds an application together with every approval
//! recorded against it and applies the chain rules in memory. Each step
//! returns a [`Transition`] describing what must be written back; the
//! caller persists it inside the transaction that loaded the aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::model::{Approval, ApprovalStatus, ApproverRole, NewApproval};
use crate::error::ApiError;
use crate::loan::{LoanApplication, LoanStatus};

/// Amount a loan must exceed before the level after `level` is required
fn escalation_threshold(level: i32) -> Option<Decimal> {
    match level {
        1 => Some(Decimal::from(10_000)),
        2 => Some(Decimal::from(50_000)),
        3 => Some(Decimal::from(200_000)),
        _ => None,
    }
}

/// Level that must sign off after `current`, if any
pub fn next_level(current: i32, loan_amount: Decimal) -> Option<i32> {
    escalation_threshold(current)
        .filter(|threshold| loan_amount > *threshold)
        .map(|_| current + 1)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Approval not found with id: {0}")]
    ApprovalNotFound(i64),

    #[error("No approvals found for loan application {0}")]
    NoApprovals(i64),

    #[error("Approval {id} is {status:?}, only PENDING approvals can be decided")]
    NotPending { id: i64, status: ApprovalStatus },

    #[error("Loan application is {actual}, expected {expected}")]
    InvalidApplicationState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Loan application {0} already has a pending approval")]
    PendingExists(i64),

    #[error("Approval level {level} does not follow level {previous}")]
    LevelOutOfOrder { previous: i32, level: i32 },
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::ApprovalNotFound(_) | WorkflowError::NoApprovals(_) => {
                ApiError::NotFound(err.to_string())
            }
            _ => ApiError::Validation(err.to_string()),
        }
    }
}

/// Writes produced by one workflow step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Approval whose decision was recorded
    pub decided: Option<Approval>,
    /// Approval to insert for the next level
    pub opened: Option<NewApproval>,
    pub application_status: LoanStatus,
}

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    application: LoanApplication,
    approvals: Vec<Approval>,
}

impl ApprovalWorkflow {
    pub fn new(application: LoanApplication, mut approvals: Vec<Approval>) -> Self {
        approvals.sort_by_key(|a| a.id);
        Self {
            application,
            approvals,
        }
    }

    pub fn application(&self) -> &LoanApplication {
        &self.application
    }

    /// Approvals in insertion order
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    pub fn into_parts(self) -> (LoanApplication, Vec<Approval>) {
        (self.application, self.approvals)
    }

    pub fn pending(&self) -> Option<&Approval> {
        self.approvals.iter().find(|a| a.is_pending())
    }

    /// Open approval, or the latest one once the chain has stopped
    pub fn current(&self) -> Result<&Approval, WorkflowError> {
        self.pending()
            .or_else(|| self.approvals.last())
            .ok_or(WorkflowError::NoApprovals(self.application.id))
    }

    /// DRAFT -> SUBMITTED and open level 1
    pub fn submit(&mut self, actor: &str) -> Result<Transition, WorkflowError> {
        if self.application.status_code != LoanStatus::Draft {
            return Err(WorkflowError::InvalidApplicationState {
                expected: LoanStatus::Draft.code(),
                actual: self.application.status_code.code(),
            });
        }
        self.ensure_nothing_pending()?;

        let opened = self.open_level(1, "Submitted for initial review".to_string(), actor);
        self.application.status_code = LoanStatus::Submitted;

        Ok(Transition {
            decided: None,
            opened: Some(opened),
            application_status: LoanStatus::Submitted,
        })
    }

    /// Sign off the pending level and escalate when the amount requires it
    pub fn approve(
        &mut self,
        approval_id: i64,
        actor: &str,
        remarks: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        let index = self.decidable(approval_id)?;
        let amount = self.application.loan_amount;

        let approval = &mut self.approvals[index];
        approval.status = ApprovalStatus::Approved;
        approval.remarks = remarks.map(str::to_string);
        approval.approved_at = Some(now);
        approval.approved_by = Some(actor.to_string());
        let level = approval.approval_level;
        let decided = approval.clone();

        let (opened, status) = match next_level(level, amount) {
            Some(next) => {
                let remarks = format!("Awaiting level {} approval", next);
                (Some(self.open_level(next, remarks, actor)), LoanStatus::UnderReview)
            }
            None => (None, LoanStatus::Approved),
        };
        self.application.status_code = status;

        Ok(Transition {
            decided: Some(decided),
            opened,
            application_status: status,
        })
    }

    /// Reject the pending level; the chain ends here
    pub fn reject(
        &mut self,
        approval_id: i64,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        self.close(
            approval_id,
            ApprovalStatus::Rejected,
            format!("Rejected: {}", reason),
            LoanStatus::Rejected,
            actor,
            now,
        )
    }

    /// Consume the pending level and park the application for more input
    pub fn request_more_info(
        &mut self,
        approval_id: i64,
        actor: &str,
        info: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        self.close(
            approval_id,
            ApprovalStatus::MoreInfoNeeded,
            format!("More information requested: {}", info),
            LoanStatus::RequiresMoreInfo,
            actor,
            now,
        )
    }

    /// Record a persisted approval produced by [`Transition::opened`]
    pub fn attach(&mut self, approval: Approval) -> Result<(), WorkflowError> {
        if approval.is_pending() {
            self.ensure_nothing_pending()?;
        }
        if let Some(previous) = self.approvals.last() {
            if approval.approval_level <= previous.approval_level {
                return Err(WorkflowError::LevelOutOfOrder {
                    previous: previous.approval_level,
                    level: approval.approval_level,
                });
            }
        }
        self.approvals.push(approval);
        Ok(())
    }

    fn close(
        &mut self,
        approval_id: i64,
        status: ApprovalStatus,
        remarks: String,
        application_status: LoanStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        let index = self.decidable(approval_id)?;

        let approval = &mut self.approvals[index];
        approval.status = status;
        approval.remarks = Some(remarks);
        approval.approved_at = Some(now);
        approval.approved_by = Some(actor.to_string());
        let decided = approval.clone();

        self.application.status_code = application_status;

        Ok(Transition {
            decided: Some(decided),
            opened: None,
            application_status,
        })
    }

    /// Index of an approval that may receive a decision
    fn decidable(&self, approval_id: i64) -> Result<usize, WorkflowError> {
        let index = self
            .approvals
            .iter()
            .position(|a| a.id == approval_id)
            .ok_or(WorkflowError::ApprovalNotFound(approval_id))?;

        let approval = &self.approvals[index];
        if !approval.is_pending() {
            return Err(WorkflowError::NotPending {
                id: approval.id,
                status: approval.status,
            });
        }

        // a pending level stays decidable while the application is still in review
        match self.application.status_code {
            LoanStatus::Submitted | LoanStatus::UnderReview | LoanStatus::RequiresMoreInfo => {
                Ok(index)
            }
            other => Err(WorkflowError::InvalidApplicationState {
                expected: "SUBMITTED, UNDER_REVIEW or REQUIRES_MORE_INFO",
                actual: other.code(),
            }),
        }
    }

    fn ensure_nothing_pending(&self) -> Result<(), WorkflowError> {
        if self.pending().is_some() {
            Err(WorkflowError::PendingExists(self.application.id))
        } else {
            Ok(())
        }
    }

    fn open_level(&self, level: i32, remarks: String, actor: &str) -> NewApproval {
        NewApproval {
            loan_application_id: self.application.id,
            approval_level: level,
            // levels come from next_level, which stops at 4
            approver_role: ApproverRole::for_level(level).unwrap_or(ApproverRole::ChiefCreditOfficer),
            remarks,
            created_by: actor.to_string(),
        }
    }
}
