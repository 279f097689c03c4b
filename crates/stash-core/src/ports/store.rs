//! Cache store port - the wire-level contract a backend must implement.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::KeyTtl;
use crate::error::CacheError;

/// Wire-level key-value store operations.
///
/// An implementation owns a single logical connection, opened lazily by the
/// first operation and closed with [`disconnect`](CacheStore::disconnect).
/// Keys are backend-qualified by the caller; values are opaque wire strings.
/// The operation set is closed: there is no raw-command dispatch.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open the connection. No-op when already open.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Close the connection. No-op when already closed.
    async fn disconnect(&self) -> Result<(), StoreError>;

    /// Current connection state, without network I/O.
    async fn is_connected(&self) -> bool;

    /// Fetch the wire value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any existing value and clearing
    /// any previous expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set the expiry of an existing key. `false` when the key is absent.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove `key`. `true` when a value was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Clear the entire database, not just one key namespace.
    async fn flush_db(&self) -> Result<(), StoreError>;

    /// Adjust the integer at `key` by `amount`, creating the key at the
    /// adjustment value when absent. Returns the resulting integer.
    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError>;

    /// Counterpart of [`incr_by`](CacheStore::incr_by).
    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError>;

    /// Fetch many keys in one round trip, position-aligned with `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Remaining time-to-live of `key`.
    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;
}

/// Store-level errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection to {url} failed: {detail}")]
    Connection { url: String, detail: String },

    #[error("{command} failed: {detail}")]
    Command { command: &'static str, detail: String },
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection { url, detail } => CacheError::Connection { url, detail },
            StoreError::Command { command, detail } => CacheError::Operation {
                operation: command,
                key: None,
                detail,
            },
        }
    }
}

// Allows one store instance to be shared by a client and other owners.
#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn connect(&self) -> Result<(), StoreError> {
        (**self).connect().await
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        (**self).disconnect().await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        (**self).expire(key, seconds).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn flush_db(&self) -> Result<(), StoreError> {
        (**self).flush_db().await
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        (**self).incr_by(key, amount).await
    }

    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64, StoreError> {
        (**self).decr_by(key, amount).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        (**self).get_many(keys).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        (**self).ttl(key).await
    }
}
