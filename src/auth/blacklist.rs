//! Revoked-token storage
//!
//! Entries expire on their own once the token would have expired anyway.
//! Redis is the shared backend; the in-process store covers single-node
//! deployments where Redis is unreachable, and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::RedisSettings;

/// Stored value for every revoked token
pub const BLACKLIST_VALUE: &str = "blacklisted";

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Short backend name for health output
    fn backend(&self) -> &'static str;
}

/// Redis-backed blacklist with a hard per-call timeout
#[derive(Clone)]
pub struct RedisBlacklist {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisBlacklist {
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.url())
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let conn = tokio::time::timeout(settings.timeout * 20, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(settings.timeout * 20))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            timeout: settings.timeout,
        })
    }
}

#[async_trait]
impl BlacklistStore for RedisBlacklist {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(BLACKLIST_VALUE).arg("EX").arg(seconds);
        let command = cmd.query_async::<_, ()>(&mut conn);

        tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();

        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let command = cmd.query_async::<_, Option<String>>(&mut conn);

        let value = tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(value.as_deref() == Some(BLACKLIST_VALUE))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// In-process blacklist keyed by expiry instant
#[derive(Clone, Default)]
pub struct MemoryBlacklist {
    entries: Arc<RwLock<HashMap<String, Instant>>>,
}

impl MemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, expires_at| *expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlacklistStore for MemoryBlacklist {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.entries.write().await.insert(key.to_string(), expires_at);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let live = self
            .entries
            .read()
            .await
            .get(key)
            .map(|expires_at| *expires_at > now);

        match live {
            Some(true) => Ok(true),
            Some(false) => {
                self.entries.write().await.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Connect to Redis, or fall back to the in-process store if it is unreachable.
pub async fn connect_blacklist(settings: &RedisSettings) -> Arc<dyn BlacklistStore> {
    match RedisBlacklist::connect(settings).await {
        Ok(store) => {
            tracing::info!(host = %settings.host, port = settings.port, "Token blacklist backed by Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                host = %settings.host,
                port = settings.port,
                "Redis unreachable, using in-process token blacklist"
            );
            let store = MemoryBlacklist::new();
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    ticker.tick().await;
                    sweeper.purge_expired().await;
                }
            });
            Arc::new(store)
        }
    }
}
