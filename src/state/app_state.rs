//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::approval::ApprovalWorkflowService;
use crate::auth::{AuthService, BlacklistStore, TokenService};
use crate::config::Config;
use crate::customer::CustomerService;
use crate::loan::LoanService;
use crate::product::ProductService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub token_service: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub customer_service: Arc<CustomerService>,
    pub product_service: Arc<ProductService>,
    pub loan_service: Arc<LoanService>,
    pub approval_service: Arc<ApprovalWorkflowService>,
}

impl AppState {
    /// Wire every service onto one pool and one blacklist backend
    pub fn new(db_pool: PgPool, config: &Config, blacklist: Arc<dyn BlacklistStore>) -> Self {
        let token_service = Arc::new(TokenService::new(config.jwt.clone(), blacklist));
        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            token_service.clone(),
            config.bcrypt_cost,
        ));

        Self {
            customer_service: Arc::new(CustomerService::new(db_pool.clone())),
            product_service: Arc::new(ProductService::new(db_pool.clone())),
            loan_service: Arc::new(LoanService::new(db_pool.clone(), config.fees)),
            approval_service: Arc::new(ApprovalWorkflowService::new(db_pool.clone())),
            token_service,
            auth_service,
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_service.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<CustomerService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.customer_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProductService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.product_service.clone()
    }
}

impl FromRef<AppState> for Arc<LoanService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.loan_service.clone()
    }
}

impl FromRef<AppState> for Arc<ApprovalWorkflowService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.approval_service.clone()
    }
}
