//! In-memory cache store - test double and fallback when Redis is
//! unavailable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use stash_core::domain::KeyTtl;
use stash_core::ports::{CacheStore, StoreError};

struct StoredEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() > at)
            .unwrap_or(false)
    }
}

/// In-memory store using a HashMap behind an async RwLock.
///
/// Data is lost on process restart. "Connection" state is a flag so the
/// lazy-connect and explicit-disconnect contract stays observable in tests.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    connected: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// INCRBY/DECRBY share one adjustment path; the TTL of an existing
    /// counter is preserved, matching the backend contract.
    async fn adjust(
        &self,
        command: &'static str,
        key: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.connect().await?;
        let mut entries = self.entries.write().await;

        let (current, expires_at) = match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                let current = entry.value.parse::<i64>().map_err(|_| StoreError::Command {
                    command,
                    detail: format!("value at `{key}` is not an integer"),
                })?;
                (current, entry.expires_at)
            }
            _ => (0, None),
        };

        let next = current.checked_add(delta).ok_or_else(|| StoreError::Command {
            command,
            detail: format!("adjustment overflows at `{key}`"),
        })?;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.connect().await?;
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                drop(entries);
                // Clean up the expired entry with a write lock
                self.entries.write().await.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.connect().await?;
        // A plain SET clears any previous expiry
        self.entries.write().await.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        self.connect().await?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.connect().await?;
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn flush_db(&self) -> Result<(), StoreError> {
        self.connect().await?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        self.adjust("INCRBY", key, amount).await
    }

    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        let delta = amount.checked_neg().ok_or_else(|| StoreError::Command {
            command: "DECRBY",
            detail: format!("adjustment overflows at `{key}`"),
        })?;
        self.adjust("DECRBY", key, delta).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.connect().await?;
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => Ok(KeyTtl::Missing),
            Some(entry) => match entry.expires_at {
                None => Ok(KeyTtl::Persistent),
                Some(at) => Ok(KeyTtl::ExpiresIn(
                    at.saturating_duration_since(Instant::now()),
                )),
            },
            None => Ok(KeyTtl::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();
        store.set("key1", "value1").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_expire_then_get_none() {
        let store = InMemoryStore::new();
        store.set("key1", "value1").await.unwrap();
        assert!(store.expire("key1", 1).await.unwrap());
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get("key1").await.unwrap(), None);
        assert_eq!(store.ttl("key1").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_expire_on_absent_key_is_false() {
        let store = InMemoryStore::new();
        assert!(!store.expire("ghost", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_clears_previous_expiry() {
        let store = InMemoryStore::new();
        store.set("key1", "a").await.unwrap();
        store.expire("key1", 30).await.unwrap();
        store.set("key1", "b").await.unwrap();
        assert_eq!(store.ttl("key1").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_counters_create_when_absent() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr_by("count", 5).await.unwrap(), 5);
        assert_eq!(store.decr_by("count", 2).await.unwrap(), 3);
        assert_eq!(store.get("count").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = InMemoryStore::new();
        store.set("word", "\"hello\"").await.unwrap();
        let err = store.incr_by("word", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Command { command: "INCRBY", .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let store = InMemoryStore::new();
        store.set("key1", "value1").await.unwrap();
        assert!(store.delete("key1").await.unwrap());
        assert!(!store.delete("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_mark_connected() {
        let store = InMemoryStore::new();
        assert!(!store.is_connected().await);
        store.set("key1", "value1").await.unwrap();
        assert!(store.is_connected().await);
        store.disconnect().await.unwrap();
        assert!(!store.is_connected().await);
    }
}
