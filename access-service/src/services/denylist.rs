use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Revoked token ids. Entries only need to outlive the token they revoke.
#[async_trait]
pub trait TokenDenylist: Send + Sync {
    async fn deny(&self, jti: &str, expiry_seconds: i64) -> Result<(), anyhow::Error>;
    async fn is_denied(&self, jti: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisDenylist {
    manager: ConnectionManager,
}

impl RedisDenylist {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self { manager })
    }
}

fn denylist_key(jti: &str) -> String {
    format!("denylist:{}", jti)
}

#[async_trait]
impl TokenDenylist for RedisDenylist {
    async fn deny(&self, jti: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();

        redis::cmd("SET")
            .arg(denylist_key(jti))
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))
    }

    async fn is_denied(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        let exists: bool = redis::cmd("EXISTS")
            .arg(denylist_key(jti))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check token revocation: {}", e))?;

        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Process-local denylist. Used when no Redis is configured and in tests.
#[derive(Default)]
pub struct MemoryDenylist {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenDenylist for MemoryDenylist {
    async fn deny(&self, jti: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let ttl = Duration::from_secs(expiry_seconds.max(1) as u64);
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Denylist mutex poisoned: {}", e))?;

        let now = Instant::now();
        entries.retain(|_, expires| *expires > now);
        entries.insert(jti.to_string(), now + ttl);
        Ok(())
    }

    async fn is_denied(&self, jti: &str) -> Result<bool, anyhow::Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Denylist mutex poisoned: {}", e))?;

        Ok(entries
            .get(jti)
            .is_some_and(|expires| *expires > Instant::now()))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
