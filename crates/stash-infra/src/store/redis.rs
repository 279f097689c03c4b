//! Redis cache store with lazy connection management.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;

use stash_core::domain::KeyTtl;
use stash_core::ports::{CacheStore, StoreError};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379/0)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// Redis-backed cache store.
///
/// Owns one logical connection, opened on first use. The driver's
/// connection manager handles reconnection on broken links; `disconnect`
/// drops the manager and a later operation re-establishes it.
pub struct RedisStore {
    client: Client,
    conn: RwLock<Option<ConnectionManager>>,
    config: RedisConfig,
}

impl RedisStore {
    /// Build a store from configuration. The URL is validated here; the
    /// connection itself is opened lazily.
    pub fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(|e| StoreError::Connection {
            url: config.url.clone(),
            detail: e.to_string(),
        })?;

        Ok(Self {
            client,
            conn: RwLock::new(None),
            config,
        })
    }

    /// Create from environment configuration.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisConfig::from_env())
    }

    fn connection_error(&self, detail: impl Into<String>) -> StoreError {
        StoreError::Connection {
            url: self.config.url.clone(),
            detail: detail.into(),
        }
    }

    fn command_error(command: &'static str, err: redis::RedisError) -> StoreError {
        StoreError::Command {
            command,
            detail: err.to_string(),
        }
    }

    /// Connection accessor used by every operation: connects when closed.
    async fn manager(&self) -> Result<ConnectionManager, StoreError> {
        {
            let conn = self.conn.read().await;
            if let Some(manager) = conn.as_ref() {
                return Ok(manager.clone());
            }
        }

        self.connect().await?;
        let conn = self.conn.read().await;
        conn.as_ref()
            .cloned()
            .ok_or_else(|| self.connection_error("connection closed during operation"))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.write().await;
        if conn.is_some() {
            return Ok(());
        }

        // Use timeout to prevent hanging if Redis is unreachable
        let manager_fut = ConnectionManager::new(self.client.clone());
        let manager = tokio::time::timeout(self.config.connect_timeout, manager_fut)
            .await
            .map_err(|_| self.connection_error("Connection timed out"))?
            .map_err(|e| self.connection_error(e.to_string()))?;

        tracing::info!(url = %self.config.url, "Connected to Redis cache store");
        *conn = Some(manager);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.write().await;
        if conn.take().is_some() {
            tracing::info!(url = %self.config.url, "Disconnected from Redis cache store");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.conn.read().await.is_some()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| Self::command_error("GET", e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| Self::command_error("SET", e))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let mut conn = self.manager().await?;
        conn.expire::<_, bool>(key, seconds as i64)
            .await
            .map_err(|e| Self::command_error("EXPIRE", e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| Self::command_error("EXISTS", e))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| Self::command_error("DEL", e))?;
        Ok(removed > 0)
    }

    async fn flush_db(&self) -> Result<(), StoreError> {
        let mut conn = self.manager().await?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::command_error("FLUSHDB", e))?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        let mut conn = self.manager().await?;
        conn.incr::<_, _, i64>(key, amount)
            .await
            .map_err(|e| Self::command_error("INCRBY", e))
    }

    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        let mut conn = self.manager().await?;
        conn.decr::<_, _, i64>(key, amount)
            .await
            .map_err(|e| Self::command_error("DECRBY", e))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        // MGET needs at least one key
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.manager().await?;
        conn.mget::<_, Vec<Option<String>>>(keys)
            .await
            .map_err(|e| Self::command_error("MGET", e))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let mut conn = self.manager().await?;
        let reply: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| Self::command_error("TTL", e))?;
        Ok(KeyTtl::from_reply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
        };

        let store = RedisStore::new(config).ok()?;
        store.connect().await.ok()?;
        Some(store)
    }

    #[tokio::test]
    async fn test_redis_store_set_get_delete() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };

        let key = "stash_test_key";
        store.set(key, "\"test_value\"").await.unwrap();
        assert_eq!(
            store.get(key).await.unwrap(),
            Some("\"test_value\"".to_string())
        );

        assert!(store.delete(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), None);
        assert!(!store.delete(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_store_set_then_expire() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = "stash_test_ttl_key";
        store.set(key, "1").await.unwrap();
        assert!(store.expire(key, 1).await.unwrap());
        assert!(matches!(
            store.ttl(key).await.unwrap(),
            KeyTtl::ExpiresIn(_)
        ));

        // Wait for expiration
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_store_lazy_reconnect() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        store.disconnect().await.unwrap();
        assert!(!store.is_connected().await);

        // An operation on a closed store transparently reconnects
        let key = "stash_test_lazy_key";
        store.set(key, "1").await.unwrap();
        assert!(store.is_connected().await);
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_store_counters() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = "stash_test_counter";
        store.delete(key).await.unwrap();
        assert_eq!(store.incr_by(key, 5).await.unwrap(), 5);
        assert_eq!(store.decr_by(key, 2).await.unwrap(), 3);
        store.delete(key).await.unwrap();
    }
}
