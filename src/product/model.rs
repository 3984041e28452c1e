use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loan product; read-only reference data
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub product_type: Option<String>,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub tenure_months: i32,
    /// Annual rate in percent
    pub interest_rate: Decimal,
    pub status_code: ProductStatus,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status_code == ProductStatus::Active
    }

    pub fn accepts_amount(&self, amount: Decimal) -> bool {
        self.min_amount <= amount && amount <= self.max_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Inactive,
}

#[derive(Debug, Deserialize)]
pub struct ProductSearch {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountQuery {
    pub amount: Decimal,
}
