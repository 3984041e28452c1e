use chrono::{DateTime, Utc};
use sqlx::PgPool;
use validator::Validate;

use crate::customer::model::{
    CreateCustomerRequest, CreditScoreResponse, CustomerResponse, UpdateCustomerRequest,
};
use crate::error::ApiError;

/// Placeholder score until a bureau integration exists
const DEFAULT_CREDIT_SCORE: i32 = 650;

const CUSTOMER_SUMMARY: &str = r#"
    SELECT c.id, c.name_en, c.name_kh, c.phone, c.address_id, c.created_at,
           COUNT(a.id) AS total_loan_applications,
           COUNT(a.id) FILTER (WHERE a.status_code = 'ACTIVE') AS active_loans,
           COALESCE(SUM(a.loan_amount), 0)::NUMERIC(18, 2) AS total_loan_amount
    FROM t_customer c
    LEFT JOIN t_loan_application a ON a.customer_id = c.id
"#;

#[derive(Clone)]
pub struct CustomerService {
    db_pool: PgPool,
}

impl CustomerService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create(&self, request: CreateCustomerRequest) -> Result<CustomerResponse, ApiError> {
        request.validate()?;

        if let Some(phone) = &request.phone {
            if self.phone_taken(phone, None).await? {
                tracing::warn!(phone = %phone, "Customer rejected: duplicate phone");
                return Err(ApiError::Validation(format!(
                    "Customer with phone {} already exists",
                    phone
                )));
            }
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO t_customer (name_en, name_kh, phone, address_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&request.name_en)
        .bind(&request.name_kh)
        .bind(&request.phone)
        .bind(request.address_id)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(customer_id = id, "Customer created");

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> Result<CustomerResponse, ApiError> {
        sqlx::query_as::<_, CustomerResponse>(&format!(
            "{} WHERE c.id = $1 GROUP BY c.id",
            CUSTOMER_SUMMARY
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer not found with id: {}", id)))
    }

    pub async fn list(&self) -> Result<Vec<CustomerResponse>, ApiError> {
        let customers = sqlx::query_as::<_, CustomerResponse>(&format!(
            "{} GROUP BY c.id ORDER BY c.id",
            CUSTOMER_SUMMARY
        ))
        .fetch_all(&self.db_pool)
        .await?;
        Ok(customers)
    }

    /// Case-insensitive substring match on either name
    pub async fn search_by_name(&self, name: &str) -> Result<Vec<CustomerResponse>, ApiError> {
        let pattern = format!("%{}%", escape_like(name.trim()));
        let customers = sqlx::query_as::<_, CustomerResponse>(&format!(
            "{} WHERE c.name_en ILIKE $1 OR c.name_kh ILIKE $1 GROUP BY c.id ORDER BY c.name_en",
            CUSTOMER_SUMMARY
        ))
        .bind(pattern)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(customers)
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<CustomerResponse, ApiError> {
        sqlx::query_as::<_, CustomerResponse>(&format!(
            "{} WHERE c.phone = $1 GROUP BY c.id",
            CUSTOMER_SUMMARY
        ))
        .bind(phone)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer not found with phone: {}", phone)))
    }

    pub async fn update(
        &self,
        id: i64,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerResponse, ApiError> {
        request.validate()?;

        if let Some(phone) = &request.phone {
            if self.phone_taken(phone, Some(id)).await? {
                tracing::warn!(customer_id = id, phone = %phone, "Customer update rejected: duplicate phone");
                return Err(ApiError::Validation(format!(
                    "Customer with phone {} already exists",
                    phone
                )));
            }
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE t_customer
            SET name_en = COALESCE($1, name_en),
                name_kh = COALESCE($2, name_kh),
                phone = COALESCE($3, phone),
                address_id = COALESCE($4, address_id)
            WHERE id = $5
            "#,
        )
        .bind(&request.name_en)
        .bind(&request.name_kh)
        .bind(&request.phone)
        .bind(request.address_id)
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(ApiError::NotFound(format!("Customer not found with id: {}", id)));
        }

        tracing::info!(customer_id = id, "Customer updated");

        self.get(id).await
    }

    /// Only customers without any loan application can be removed
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM t_customer WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(ApiError::NotFound(format!("Customer not found with id: {}", id)));
        }

        let applications: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM t_loan_application WHERE customer_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if applications > 0 {
            tracing::warn!(customer_id = id, applications, "Customer delete refused");
            return Err(ApiError::Conflict(format!(
                "Customer {} has {} loan application(s) and cannot be deleted",
                id, applications
            )));
        }

        sqlx::query("DELETE FROM t_customer WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(customer_id = id, "Customer deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM t_customer")
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    pub async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CustomerResponse>, ApiError> {
        if from > to {
            return Err(ApiError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }

        let customers = sqlx::query_as::<_, CustomerResponse>(&format!(
            "{} WHERE c.created_at BETWEEN $1 AND $2 GROUP BY c.id ORDER BY c.created_at",
            CUSTOMER_SUMMARY
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(customers)
    }

    pub async fn credit_score(&self, id: i64) -> Result<CreditScoreResponse, ApiError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM t_customer WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db_pool)
            .await?;
        if !exists {
            return Err(ApiError::NotFound(format!("Customer not found with id: {}", id)));
        }

        Ok(CreditScoreResponse {
            customer_id: id,
            credit_score: DEFAULT_CREDIT_SCORE,
        })
    }

    async fn phone_taken(&self, phone: &str, except_id: Option<i64>) -> Result<bool, ApiError> {
        let taken = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM t_customer WHERE phone = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(phone)
        .bind(except_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(taken)
    }
}

/// Escape LIKE wildcards in user input
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Sok"), "Sok");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
