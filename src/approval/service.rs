use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use super::model::{Approval, ApprovalResponse, ApproverRole, NewApproval};
use super::workflow::{ApprovalWorkflow, Transition};
use crate::error::ApiError;
use crate::loan::service::lock_application;
use crate::loan::LoanApplication;

/// Approval workflow service
///
/// Every step locks the application row, rebuilds the aggregate from its
/// approvals and writes the resulting transition in the same transaction.
#[derive(Clone)]
pub struct ApprovalWorkflowService {
    db_pool: PgPool,
}

impl ApprovalWorkflowService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn submit(&self, application_id: i64, actor: &str) -> Result<ApprovalResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let mut workflow = load_workflow(&mut tx, application_id).await?;

        let transition = workflow.submit(actor)?;
        let (approval, application) = apply(&mut tx, &workflow, transition).await?;
        let approval = approval.ok_or_else(|| {
            ApiError::Internal("Submission did not open an approval".to_string())
        })?;

        tx.commit().await?;

        tracing::info!(
            application_id,
            approval_id = approval.id,
            actor = %actor,
            "Loan application submitted for approval"
        );

        Ok(respond(approval, &application))
    }

    pub async fn approve(
        &self,
        approval_id: i64,
        actor: &str,
        remarks: Option<&str>,
    ) -> Result<ApprovalResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application_id = application_of(&mut tx, approval_id).await?;
        let mut workflow = load_workflow(&mut tx, application_id).await?;

        let transition = workflow.approve(approval_id, actor, remarks, Utc::now())?;
        let decided = decided(&transition)?;
        let (opened, application) = apply(&mut tx, &workflow, transition).await?;

        tx.commit().await?;

        match &opened {
            Some(next) => tracing::info!(
                application_id,
                approval_id,
                next_level = next.approval_level,
                actor = %actor,
                "Approval level signed off, escalated"
            ),
            None => tracing::info!(
                application_id,
                approval_id,
                actor = %actor,
                "Approval chain complete, application approved"
            ),
        }

        Ok(respond(decided, &application))
    }

    pub async fn reject(
        &self,
        approval_id: i64,
        actor: &str,
        reason: &str,
    ) -> Result<ApprovalResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application_id = application_of(&mut tx, approval_id).await?;
        let mut workflow = load_workflow(&mut tx, application_id).await?;

        let transition = workflow.reject(approval_id, actor, reason, Utc::now())?;
        let decided = decided(&transition)?;
        let (_, application) = apply(&mut tx, &workflow, transition).await?;

        tx.commit().await?;

        tracing::info!(application_id, approval_id, actor = %actor, "Approval level rejected");

        Ok(respond(decided, &application))
    }

    pub async fn request_more_info(
        &self,
        approval_id: i64,
        actor: &str,
        info: &str,
    ) -> Result<ApprovalResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application_id = application_of(&mut tx, approval_id).await?;
        let mut workflow = load_workflow(&mut tx, application_id).await?;

        let transition = workflow.request_more_info(approval_id, actor, info, Utc::now())?;
        let decided = decided(&transition)?;
        let (_, application) = apply(&mut tx, &workflow, transition).await?;

        tx.commit().await?;

        tracing::info!(application_id, approval_id, actor = %actor, "More information requested");

        Ok(respond(decided, &application))
    }

    pub async fn current(&self, application_id: i64) -> Result<ApprovalResponse, ApiError> {
        let application = self.application(application_id).await?;
        let approvals = self.approvals(application_id).await?;
        let workflow = ApprovalWorkflow::new(application, approvals);

        let current = workflow.current()?.clone();
        Ok(respond(current, workflow.application()))
    }

    pub async fn history(&self, application_id: i64) -> Result<Vec<ApprovalResponse>, ApiError> {
        let application = self.application(application_id).await?;
        let approvals = self.approvals(application_id).await?;

        Ok(approvals
            .into_iter()
            .map(|approval| respond(approval, &application))
            .collect())
    }

    /// Open approvals waiting on `role`, oldest first
    pub async fn pending_by_role(&self, role: ApproverRole) -> Result<Vec<ApprovalResponse>, ApiError> {
        let rows = sqlx::query_as::<_, Approval>(
            r#"
            SELECT * FROM t_loan_approval
            WHERE approver_role = $1 AND status = 'PENDING'
            ORDER BY created_at, id
            "#,
        )
        .bind(role)
        .fetch_all(&self.db_pool)
        .await?;

        let mut responses = Vec::with_capacity(rows.len());
        for approval in rows {
            let application = self.application(approval.loan_application_id).await?;
            responses.push(respond(approval, &application));
        }
        Ok(responses)
    }

    async fn application(&self, id: i64) -> Result<LoanApplication, ApiError> {
        sqlx::query_as::<_, LoanApplication>("SELECT * FROM t_loan_application WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan application not found with id: {}", id)))
    }

    async fn approvals(&self, application_id: i64) -> Result<Vec<Approval>, ApiError> {
        let approvals = sqlx::query_as::<_, Approval>(
            "SELECT * FROM t_loan_approval WHERE loan_application_id = $1 ORDER BY id",
        )
        .bind(application_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(approvals)
    }
}

async fn application_of(conn: &mut PgConnection, approval_id: i64) -> Result<i64, ApiError> {
    sqlx::query_scalar("SELECT loan_application_id FROM t_loan_approval WHERE id = $1")
        .bind(approval_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Approval not found with id: {}", approval_id)))
}

async fn load_workflow(
    conn: &mut PgConnection,
    application_id: i64,
) -> Result<ApprovalWorkflow, ApiError> {
    let application = lock_application(&mut *conn, application_id).await?;

    let approvals = sqlx::query_as::<_, Approval>(
        "SELECT * FROM t_loan_approval WHERE loan_application_id = $1 ORDER BY id",
    )
    .bind(application_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ApprovalWorkflow::new(application, approvals))
}

/// Persist a transition; returns the inserted approval and the updated application
async fn apply(
    conn: &mut PgConnection,
    workflow: &ApprovalWorkflow,
    transition: Transition,
) -> Result<(Option<Approval>, LoanApplication), ApiError> {
    if let Some(decided) = &transition.decided {
        sqlx::query(
            r#"
            UPDATE t_loan_approval
            SET status = $1, remarks = $2, approved_at = $3, approved_by = $4
            WHERE id = $5
            "#,
        )
        .bind(decided.status)
        .bind(&decided.remarks)
        .bind(decided.approved_at)
        .bind(&decided.approved_by)
        .bind(decided.id)
        .execute(&mut *conn)
        .await?;
    }

    let opened = match transition.opened {
        Some(new) => Some(insert_approval(&mut *conn, new).await?),
        None => None,
    };

    let application = sqlx::query_as::<_, LoanApplication>(
        "UPDATE t_loan_application SET status_code = $1 WHERE id = $2 RETURNING *",
    )
    .bind(transition.application_status)
    .bind(workflow.application().id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((opened, application))
}

async fn insert_approval(conn: &mut PgConnection, new: NewApproval) -> Result<Approval, ApiError> {
    let approval = sqlx::query_as::<_, Approval>(
        r#"
        INSERT INTO t_loan_approval (
            loan_application_id, approval_level, approver_role, status, remarks, created_by
        )
        VALUES ($1, $2, $3, 'PENDING', $4, $5)
        RETURNING *
        "#,
    )
    .bind(new.loan_application_id)
    .bind(new.approval_level)
    .bind(new.approver_role)
    .bind(&new.remarks)
    .bind(&new.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(approval)
}

fn decided(transition: &Transition) -> Result<Approval, ApiError> {
    transition
        .decided
        .clone()
        .ok_or_else(|| ApiError::Internal("Workflow step recorded no decision".to_string()))
}

fn respond(approval: Approval, application: &LoanApplication) -> ApprovalResponse {
    ApprovalResponse {
        approval,
        loan_application_status: application.status_code,
        loan_amount: application.loan_amount,
    }
}
