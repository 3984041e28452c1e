//! PostgreSQL pool and embedded schema migrations

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::{Config, PoolSettings};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
}

/// Connect eagerly, so a bad URL or unreachable server fails startup.
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.pool.max_connections,
        acquire_timeout_ms = config.pool.acquire_timeout.as_millis() as u64,
        "Connecting to database"
    );

    let pool = pool_options(&config.pool)
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let known = MIGRATOR.iter().count();
    tracing::info!(migrations = known, "Applying schema migrations");

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Schema up to date");
    Ok(())
}

/// Pool that defers connecting until first use
pub fn create_lazy_pool(database_url: &str) -> Result<PgPool, DbError> {
    let settings = PoolSettings {
        max_connections: 1,
        ..PoolSettings::default()
    };
    pool_options(&settings)
        .connect_lazy(database_url)
        .map_err(|e| DbError::ConnectionError(e.to_string()))
}

/// `SELECT 1` round trip for the health endpoint
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pool_options_follow_settings() {
        let settings = PoolSettings {
            max_connections: 12,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(90),
        };
        let options = pool_options(&settings);

        assert_eq!(options.get_max_connections(), 12);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().count() >= 2);
    }
}
