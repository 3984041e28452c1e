use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::product::model::{Product, ProductStatus};

#[derive(Clone)]
pub struct ProductService {
    db_pool: PgPool,
}

impl ProductService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn list(&self) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM m_product ORDER BY id")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(products)
    }

    pub async fn list_active(&self) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM m_product WHERE status_code = $1 ORDER BY id",
        )
        .bind(ProductStatus::Active)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(products)
    }

    pub async fn get(&self, id: i64) -> Result<Product, ApiError> {
        sqlx::query_as::<_, Product>("SELECT * FROM m_product WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Product not found with id: {}", id)))
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Product, ApiError> {
        sqlx::query_as::<_, Product>("SELECT * FROM m_product WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Product not found with code: {}", code)))
    }

    pub async fn list_by_type(&self, product_type: &str) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM m_product WHERE product_type = $1 ORDER BY id",
        )
        .bind(product_type)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(products)
    }

    /// Active products whose code or name contains `q`
    pub async fn search(&self, q: &str) -> Result<Vec<Product>, ApiError> {
        let pattern = format!("%{}%", q.trim());
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM m_product
            WHERE status_code = $1 AND (name ILIKE $2 OR code ILIKE $2)
            ORDER BY name
            "#,
        )
        .bind(ProductStatus::Active)
        .bind(pattern)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(products)
    }

    /// Active products whose amount range covers `amount`
    pub async fn for_amount(&self, amount: Decimal) -> Result<Vec<Product>, ApiError> {
        if amount <= Decimal::ZERO {
            return Err(ApiError::Validation("Amount must be greater than zero".to_string()));
        }

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM m_product
            WHERE status_code = $1 AND min_amount <= $2 AND max_amount >= $2
            ORDER BY interest_rate, id
            "#,
        )
        .bind(ProductStatus::Active)
        .bind(amount)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(products)
    }

    pub async fn count_active(&self) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM m_product WHERE status_code = $1")
            .bind(ProductStatus::Active)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }
}
