//! Loan application lifecycle: creation, explicit status moves, final
//! approve/reject decisions and derived figures.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::FeePolicy;
use crate::error::ApiError;
use crate::loan::model::{CreateLoanApplicationRequest, LoanApplication, LoanStatus};
use crate::product::Product;
use crate::services::{calculate_emi, calculate_processing_fee, EmiCalculation};

/// Statuses whose loan amount counts as approved for branch totals
const APPROVED_STATES: [LoanStatus; 5] = [
    LoanStatus::Approved,
    LoanStatus::Disbursed,
    LoanStatus::Active,
    LoanStatus::Closed,
    LoanStatus::Defaulted,
];

/// `APP-<last 6 digits of epoch millis>-<8 upper-case hex chars>`
pub fn generate_application_no(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    let random = Uuid::new_v4().simple().to_string();
    format!("APP-{}-{}", tail, random[..8].to_uppercase())
}

/// Load an application and hold its row lock until the transaction ends.
pub(crate) async fn lock_application(
    conn: &mut PgConnection,
    id: i64,
) -> Result<LoanApplication, ApiError> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM t_loan_application WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Loan application not found with id: {}", id))
}

/// Loan application service
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    fees: FeePolicy,
}

impl LoanService {
    pub fn new(db_pool: PgPool, fees: FeePolicy) -> Self {
        Self { db_pool, fees }
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fees
    }

    /// Create a DRAFT application against an active product
    pub async fn create(
        &self,
        request: CreateLoanApplicationRequest,
    ) -> Result<LoanApplication, ApiError> {
        request.validate()?;
        if request.loan_amount <= Decimal::ZERO {
            return Err(ApiError::Validation(
                "Loan amount must be greater than zero".to_string(),
            ));
        }

        let customer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM t_customer WHERE id = $1)")
                .bind(request.customer_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !customer_exists {
            return Err(ApiError::NotFound(format!(
                "Customer not found with id: {}",
                request.customer_id
            )));
        }

        let product = sqlx::query_as::<_, Product>("SELECT * FROM m_product WHERE id = $1")
            .bind(request.product_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Product not found with id: {}", request.product_id))
            })?;

        if !product.is_active() {
            tracing::warn!(product_id = product.id, "Application rejected: product inactive");
            return Err(ApiError::Validation(format!(
                "Product {} is not active",
                product.code
            )));
        }
        if !product.accepts_amount(request.loan_amount) {
            tracing::warn!(
                product_id = product.id,
                amount = %request.loan_amount,
                "Application rejected: amount out of range"
            );
            return Err(ApiError::Validation(format!(
                "Loan amount must be between {} and {}",
                product.min_amount, product.max_amount
            )));
        }

        let tenure_month = request.tenure_month.unwrap_or(product.tenure_months);
        let processing_fee =
            calculate_processing_fee(request.loan_amount, self.fees.percentage, self.fees.min_fee)?;
        let application_no = generate_application_no(Utc::now());

        let application = sqlx::query_as::<_, LoanApplication>(
            r#"
            INSERT INTO t_loan_application (
                application_no, customer_id, product_id, branch_id, loan_amount,
                tenure_month, interest_rate, processing_fee, status_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&application_no)
        .bind(request.customer_id)
        .bind(product.id)
        .bind(request.branch_id)
        .bind(request.loan_amount)
        .bind(tenure_month)
        .bind(product.interest_rate)
        .bind(processing_fee)
        .bind(LoanStatus::Draft)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            application_id = application.id,
            application_no = %application.application_no,
            amount = %application.loan_amount,
            "Loan application created"
        );

        Ok(application)
    }

    pub async fn get(&self, id: i64) -> Result<LoanApplication, ApiError> {
        sqlx::query_as::<_, LoanApplication>("SELECT * FROM t_loan_application WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn get_by_number(&self, application_no: &str) -> Result<LoanApplication, ApiError> {
        sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM t_loan_application WHERE application_no = $1",
        )
        .bind(application_no)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Loan application not found: {}", application_no))
        })
    }

    pub async fn list(&self) -> Result<Vec<LoanApplication>, ApiError> {
        let applications = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM t_loan_application ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.db_pool)
        .await?;
        Ok(applications)
    }

    pub async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<LoanApplication>, ApiError> {
        let applications = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM t_loan_application WHERE customer_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(applications)
    }

    pub async fn list_by_status(&self, status: LoanStatus) -> Result<Vec<LoanApplication>, ApiError> {
        let applications = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM t_loan_application WHERE status_code = $1 ORDER BY created_at, id",
        )
        .bind(status)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(applications)
    }

    /// Move an application along the status table
    pub async fn update_status(
        &self,
        id: i64,
        next: LoanStatus,
        remarks: Option<&str>,
        actor: &str,
    ) -> Result<LoanApplication, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application = lock_application(&mut tx, id).await?;

        if let Err(e) = application.status_code.ensure_transition(next) {
            tracing::warn!(
                application_id = id,
                from = application.status_code.code(),
                to = next.code(),
                "Status change rejected"
            );
            return Err(e);
        }

        let updated = sqlx::query_as::<_, LoanApplication>(
            "UPDATE t_loan_application SET status_code = $1 WHERE id = $2 RETURNING *",
        )
        .bind(next)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            application_id = id,
            from = application.status_code.code(),
            to = next.code(),
            actor = %actor,
            remarks = remarks.unwrap_or(""),
            "Loan application status changed"
        );

        Ok(updated)
    }

    /// Final approval; the approved amount replaces the applied amount
    pub async fn approve(
        &self,
        id: i64,
        approved_amount: Decimal,
        actor: &str,
    ) -> Result<LoanApplication, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application = lock_application(&mut tx, id).await?;

        if application.status_code != LoanStatus::UnderReview {
            return Err(ApiError::Validation(format!(
                "Only applications under review can be approved; current status is {}",
                application.status_code.code()
            )));
        }
        if approved_amount <= Decimal::ZERO || approved_amount > application.loan_amount {
            return Err(ApiError::Validation(format!(
                "Approved amount must be greater than zero and at most {}",
                application.loan_amount
            )));
        }

        let updated = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE t_loan_application
            SET status_code = $1, loan_amount = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(LoanStatus::Approved)
        .bind(approved_amount)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            application_id = id,
            applied = %application.loan_amount,
            approved = %approved_amount,
            actor = %actor,
            "Loan application approved"
        );

        Ok(updated)
    }

    pub async fn reject(&self, id: i64, reason: &str, actor: &str) -> Result<LoanApplication, ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application = lock_application(&mut tx, id).await?;

        if application.status_code != LoanStatus::UnderReview {
            return Err(ApiError::Validation(format!(
                "Only applications under review can be rejected; current status is {}",
                application.status_code.code()
            )));
        }

        let updated = sqlx::query_as::<_, LoanApplication>(
            "UPDATE t_loan_application SET status_code = $1 WHERE id = $2 RETURNING *",
        )
        .bind(LoanStatus::Rejected)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(application_id = id, actor = %actor, reason = %reason, "Loan application rejected");

        Ok(updated)
    }

    /// Drafts only; approvals go with the application
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let mut tx = self.db_pool.begin().await?;
        let application = lock_application(&mut tx, id).await?;

        if application.status_code != LoanStatus::Draft {
            return Err(ApiError::Validation(format!(
                "Only draft applications can be deleted; current status is {}",
                application.status_code.code()
            )));
        }

        sqlx::query("DELETE FROM t_loan_application WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(application_id = id, "Draft loan application deleted");
        Ok(())
    }

    pub async fn total_approved_by_branch(&self, branch_id: i64) -> Result<Decimal, ApiError> {
        let states = APPROVED_STATES
            .iter()
            .map(|s| format!("'{}'", s.code()))
            .collect::<Vec<_>>()
            .join(", ");
        let total: Decimal = sqlx::query_scalar(&format!(
            r#"
            SELECT COALESCE(SUM(loan_amount), 0)::NUMERIC(18, 2)
            FROM t_loan_application
            WHERE branch_id = $1 AND status_code IN ({})
            "#,
            states
        ))
        .bind(branch_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(total)
    }

    pub async fn count_by_status_since(
        &self,
        status: LoanStatus,
        since: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM t_loan_application WHERE status_code = $1 AND created_at >= $2",
        )
        .bind(status)
        .bind(since)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(count)
    }

    /// Amortization of the application's current amount, rate and tenure
    pub async fn repayment_schedule(
        &self,
        id: i64,
        first_payment_date: Option<NaiveDate>,
    ) -> Result<EmiCalculation, ApiError> {
        let application = self.get(id).await?;
        let tenure = u32::try_from(application.tenure_month)
            .map_err(|_| ApiError::Validation("Tenure must be positive".to_string()))?;

        Ok(calculate_emi(
            application.loan_amount,
            application.interest_rate,
            tenure,
            first_payment_date,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_application_number_format() {
        let now = Utc.timestamp_millis_opt(1_717_171_717_123).unwrap();
        let number = generate_application_no(now);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "APP");
        assert_eq!(parts[1], "717123");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_application_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate_application_no(now), generate_application_no(now));
    }
}
