//! Service tests against a live PostgreSQL schema

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use los_server::approval::{ApprovalStatus, ApprovalWorkflowService, ApproverRole};
    use los_server::auth::{AuthService, BlacklistStore, CacheError, MemoryBlacklist, TokenService};
    use los_server::config::{Config, FeePolicy};
    use los_server::customer::{CreateCustomerRequest, CustomerService};
    use los_server::error::ApiError;
    use los_server::loan::{CreateLoanApplicationRequest, LoanService, LoanStatus};
    use los_server::models::{LoginRequest, RegisterRequest};
    use los_server::routes::api_router;
    use los_server::state::AppState;

    const SECRET: &str = "k8Zq1vN3rT7yW2pL5mX9cB4hJ6fD0gAs";

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/los_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        los_server::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn unique(prefix: &str) -> String {
        format!("{}{}", prefix, &Uuid::new_v4().simple().to_string()[..10])
    }

    fn test_config() -> Config {
        let vars: HashMap<String, String> = [
            ("DATABASE_URL", "postgres://localhost/los_test"),
            ("JWT_SECRET_KEY", SECRET),
            ("BCRYPT_COST", "4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Config::from_map(&vars).unwrap()
    }

    fn auth_service(pool: &PgPool) -> AuthService {
        let config = test_config();
        let tokens = Arc::new(TokenService::new(config.jwt, Arc::new(MemoryBlacklist::new())));
        AuthService::new(pool.clone(), tokens, 4)
    }

    fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            phone: None,
            password: "correct-horse-battery".to_string(),
            branch_id: Some(1),
            role_code: "LOAN_OFFICER".to_string(),
        }
    }

    async fn product_id(pool: &PgPool, code: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM m_product WHERE code = $1")
            .bind(code)
            .fetch_one(pool)
            .await
            .expect("seeded product")
    }

    async fn new_customer(pool: &PgPool) -> i64 {
        CustomerService::new(pool.clone())
            .create(CreateCustomerRequest {
                name_en: "Sok Dara".to_string(),
                name_kh: None,
                phone: Some(unique("+855")),
                address_id: None,
            })
            .await
            .expect("customer")
            .id
    }

    async fn draft_application(pool: &PgPool, amount: Decimal) -> i64 {
        let customer_id = new_customer(pool).await;
        let product_id = product_id(pool, "HL-STD").await;

        LoanService::new(pool.clone(), FeePolicy::default())
            .create(CreateLoanApplicationRequest {
                customer_id,
                product_id,
                branch_id: Some(1),
                loan_amount: amount,
                tenure_month: None,
            })
            .await
            .expect("application")
            .id
    }

    async fn pending_count(pool: &PgPool, application_id: i64) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM t_loan_approval WHERE loan_application_id = $1 AND status = 'PENDING'",
        )
        .bind(application_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_application_defaults_from_product() {
        let pool = setup_test_db().await;
        let id = draft_application(&pool, dec!(150000)).await;

        let application = LoanService::new(pool.clone(), FeePolicy::default())
            .get(id)
            .await
            .unwrap();

        assert_eq!(application.status_code, LoanStatus::Draft);
        assert_eq!(application.tenure_month, 240);
        assert_eq!(application.interest_rate, dec!(8.75));
        assert_eq!(application.processing_fee, dec!(1500.00));
        assert!(application.application_no.starts_with("APP-"));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_amount_outside_product_bounds() {
        let pool = setup_test_db().await;
        let customer_id = new_customer(&pool).await;
        let product_id = product_id(&pool, "PL-STD").await;

        let result = LoanService::new(pool.clone(), FeePolicy::default())
            .create(CreateLoanApplicationRequest {
                customer_id,
                product_id,
                branch_id: None,
                loan_amount: dec!(50000.01),
                tenure_month: None,
            })
            .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_inactive_product_refused() {
        let pool = setup_test_db().await;
        let customer_id = new_customer(&pool).await;
        let product_id = product_id(&pool, "PL-OLD").await;

        let result = LoanService::new(pool.clone(), FeePolicy::default())
            .create(CreateLoanApplicationRequest {
                customer_id,
                product_id,
                branch_id: None,
                loan_amount: dec!(5000),
                tenure_month: Some(12),
            })
            .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_level_escalation_for_150k() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(150000)).await;
        let workflow = ApprovalWorkflowService::new(pool.clone());

        let level1 = workflow.submit(application_id, "officer1").await.unwrap();
        assert_eq!(level1.loan_application_status, LoanStatus::Submitted);
        assert_eq!(level1.approval.approver_role, ApproverRole::LoanOfficer);

        let decided = workflow.approve(level1.approval.id, "officer1", None).await.unwrap();
        assert_eq!(decided.loan_application_status, LoanStatus::UnderReview);
        let level2 = workflow.current(application_id).await.unwrap();
        assert_eq!(level2.approval.approval_level, 2);
        assert_eq!(level2.approval.approver_role, ApproverRole::BranchManager);

        let pending = workflow.pending_by_role(ApproverRole::BranchManager).await.unwrap();
        assert!(pending.iter().any(|p| p.approval.id == level2.approval.id));

        workflow.approve(level2.approval.id, "manager1", Some("ok")).await.unwrap();
        let level3 = workflow.current(application_id).await.unwrap();
        assert_eq!(level3.approval.approver_role, ApproverRole::RegionalDirector);

        let last = workflow.approve(level3.approval.id, "director1", None).await.unwrap();
        assert_eq!(last.loan_application_status, LoanStatus::Approved);

        let history = workflow.history(application_id).await.unwrap();
        let levels: Vec<i32> = history.iter().map(|h| h.approval.approval_level).collect();
        assert_eq!(levels, vec![1, 2, 3]);
        assert_eq!(pending_count(&pool, application_id).await, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_rejection_terminates_chain() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(80000)).await;
        let workflow = ApprovalWorkflowService::new(pool.clone());

        let level1 = workflow.submit(application_id, "officer1").await.unwrap();
        let rejected = workflow
            .reject(level1.approval.id, "officer1", "incomplete documents")
            .await
            .unwrap();

        assert_eq!(rejected.approval.status, ApprovalStatus::Rejected);
        assert_eq!(rejected.loan_application_status, LoanStatus::Rejected);

        let again = workflow.approve(level1.approval.id, "officer1", None).await;
        assert!(matches!(again, Err(ApiError::Validation(_))));
        assert_eq!(workflow.history(application_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_approvals_decide_once() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(150000)).await;
        let workflow = ApprovalWorkflowService::new(pool.clone());
        let level1 = workflow.submit(application_id, "officer1").await.unwrap();

        let (a, b) = tokio::join!(
            workflow.approve(level1.approval.id, "officer1", None),
            workflow.approve(level1.approval.id, "officer2", None),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(pending_count(&pool, application_id).await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_illegal_status_change_leaves_state() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(30000)).await;
        let loans = LoanService::new(pool.clone(), FeePolicy::default());

        let result = loans
            .update_status(application_id, LoanStatus::Approved, None, "officer1")
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(loans.get(application_id).await.unwrap().status_code, LoanStatus::Draft);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_final_approval_overwrites_amount() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(30000)).await;
        let loans = LoanService::new(pool.clone(), FeePolicy::default());

        loans
            .update_status(application_id, LoanStatus::Submitted, None, "officer1")
            .await
            .unwrap();
        loans
            .update_status(application_id, LoanStatus::UnderReview, None, "officer1")
            .await
            .unwrap();

        let too_much = loans.approve(application_id, dec!(30000.01), "manager1").await;
        assert!(matches!(too_much, Err(ApiError::Validation(_))));

        let approved = loans.approve(application_id, dec!(25000), "manager1").await.unwrap();
        assert_eq!(approved.status_code, LoanStatus::Approved);
        assert_eq!(approved.loan_amount, dec!(25000));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_only_drafts_can_be_deleted() {
        let pool = setup_test_db().await;
        let application_id = draft_application(&pool, dec!(30000)).await;
        let loans = LoanService::new(pool.clone(), FeePolicy::default());
        let workflow = ApprovalWorkflowService::new(pool.clone());

        workflow.submit(application_id, "officer1").await.unwrap();
        assert!(matches!(loans.delete(application_id).await, Err(ApiError::Validation(_))));

        let other = draft_application(&pool, dec!(30000)).await;
        loans.delete(other).await.unwrap();
        assert!(matches!(loans.get(other).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_duplicate_username_rejected() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);
        let username = unique("user_");

        auth.register(register_request(&username)).await.unwrap();

        let mut duplicate = register_request(&username);
        duplicate.email = format!("other-{}@example.com", username);
        assert!(matches!(
            auth.register(duplicate).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_refresh_rotation_invalidates_old_token() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);
        let username = unique("user_");

        let registered = auth.register(register_request(&username)).await.unwrap();
        let rotated = auth.refresh(&registered.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, registered.refresh_token);

        assert!(matches!(
            auth.refresh(&registered.refresh_token).await,
            Err(ApiError::AuthFailed(_))
        ));
        assert!(auth.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_refresh_yields_one_pair() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);
        let username = unique("user_");

        let login = {
            auth.register(register_request(&username)).await.unwrap();
            auth.authenticate(LoginRequest {
                username_or_email: username.clone(),
                password: "correct-horse-battery".to_string(),
            })
            .await
            .unwrap()
        };

        let (a, b) = tokio::join!(
            auth.refresh(&login.refresh_token),
            auth.refresh(&login.refresh_token),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_wrong_password_is_unauthorized() {
        let pool = setup_test_db().await;
        let auth = auth_service(&pool);
        let username = unique("user_");
        auth.register(register_request(&username)).await.unwrap();

        let result = auth
            .authenticate(LoginRequest {
                username_or_email: format!("{}@example.com", username),
                password: "wrong-password".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ApiError::AuthFailed(_))));
    }

    /// Memory blacklist that counts lookups
    #[derive(Default)]
    struct CountingBlacklist {
        inner: MemoryBlacklist,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl BlacklistStore for CountingBlacklist {
        async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
            self.inner.insert(key, ttl).await
        }

        async fn contains(&self, key: &str) -> Result<bool, CacheError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.contains(key).await
        }

        fn backend(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_authenticated_request_checks_blacklist_once() {
        let pool = setup_test_db().await;
        let blacklist = Arc::new(CountingBlacklist::default());
        let state = AppState::new(pool, &test_config(), blacklist.clone());
        let username = unique("user_");
        let registered = state
            .auth_service
            .register(register_request(&username))
            .await
            .unwrap();

        let request = Request::builder()
            .method("GET")
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", registered.access_token))
            .body(Body::empty())
            .unwrap();
        let response = api_router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(blacklist.lookups.load(Ordering::SeqCst), 1);
    }
}
