//! The cache client - typed look-aside operations over a [`CacheStore`].

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::codec;
use crate::config::CacheConfig;
use crate::domain::{
    CacheEvent, CacheEventKind, CacheKey, CacheListener, CacheStats, Expiration, KeyBuilder,
    KeyTtl, ListenerId, ListenerRegistry, StatsCounters,
};
use crate::error::CacheError;
use crate::ports::{CacheStore, StoreError};

/// Typed look-aside cache client over a [`CacheStore`] backend.
///
/// One client owns one backend connection, a listener set, and hit/miss
/// counters. All methods take `&self` and the client is safe to share
/// across concurrent call sites without external synchronization.
///
/// `add`, `pull`, and `remember` are composed of multiple backend calls and
/// are not atomic: concurrent callers racing on one key can each observe it
/// absent, and the last write wins.
pub struct CacheClient<S> {
    store: S,
    keys: KeyBuilder,
    default_ttl: Duration,
    listeners: ListenerRegistry,
    stats: StatsCounters,
}

impl<S: CacheStore> CacheClient<S> {
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self {
            store,
            keys: KeyBuilder::new(config.prefix),
            default_ttl: config.default_ttl,
            listeners: ListenerRegistry::default(),
            stats: StatsCounters::default(),
        }
    }

    /// Backend-qualified form of a logical key.
    pub fn backend_key(&self, key: &CacheKey) -> String {
        self.keys.build(key)
    }

    // --- connection lifecycle -------------------------------------------

    /// Open the backend connection. Operations connect lazily on first use;
    /// this is for callers that want connectivity errors up front.
    pub async fn connect(&self) -> Result<(), CacheError> {
        self.store.connect().await.map_err(CacheError::from)
    }

    /// Close the backend connection. A later operation reconnects
    /// transparently.
    pub async fn disconnect(&self) -> Result<(), CacheError> {
        self.store.disconnect().await.map_err(CacheError::from)
    }

    pub async fn is_connected(&self) -> bool {
        self.store.is_connected().await
    }

    // --- basic operations -----------------------------------------------

    /// Fetch and deserialize the value under `key`, `None` on miss.
    ///
    /// Counts toward hit/miss statistics and emits a Hit or Miss event
    /// carrying the round-trip time.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: impl Into<CacheKey>,
    ) -> Result<Option<T>, CacheError> {
        let backend_key = self.keys.build(&key.into());
        let started = Instant::now();

        let raw = self
            .store
            .get(&backend_key)
            .await
            .map_err(|err| self.fail("get", Some(&backend_key), err))?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let value = codec::decode::<T>(raw).map_err(|err| {
            self.emit_error("get", Some(&backend_key), &err);
            err
        })?;

        if value.is_some() {
            self.stats.record_hit();
            self.emit(
                CacheEventKind::Hit,
                Some(&backend_key),
                json!({ "elapsed_ms": elapsed_ms }),
            );
        } else {
            self.stats.record_miss();
            self.emit(
                CacheEventKind::Miss,
                Some(&backend_key),
                json!({ "elapsed_ms": elapsed_ms }),
            );
        }

        Ok(value)
    }

    /// [`get`](Self::get) with a fallback value for misses.
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: impl Into<CacheKey>,
        default: T,
    ) -> Result<T, CacheError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Serialize and store a value.
    ///
    /// When the TTL resolves to a finite number of seconds, the expiry is
    /// applied with a follow-up call after the write. Emits a Set event with
    /// the TTL actually applied. `Ok(true)` once the backend acknowledged.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey>,
        value: &T,
        ttl: Expiration,
    ) -> Result<bool, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.put_qualified("put", &backend_key, value, ttl)
            .await
            .map_err(|err| {
                self.emit_error("put", Some(&backend_key), &err);
                err
            })
    }

    /// Store a value only when the key is currently absent; `Ok(false)`
    /// without mutating anything when it exists.
    ///
    /// Existence check and write are two separate backend calls: concurrent
    /// callers can both observe the key absent and both write.
    pub async fn add<T: Serialize + ?Sized>(
        &self,
        key: impl Into<CacheKey>,
        value: &T,
        ttl: Expiration,
    ) -> Result<bool, CacheError> {
        let backend_key = self.keys.build(&key.into());

        let present = self
            .store
            .exists(&backend_key)
            .await
            .map_err(|err| self.fail("add", Some(&backend_key), err))?;
        if present {
            return Ok(false);
        }

        self.put_qualified("add", &backend_key, value, ttl)
            .await
            .map_err(|err| {
                self.emit_error("add", Some(&backend_key), &err);
                err
            })
    }

    /// Whether a value currently exists under `key`.
    pub async fn has(&self, key: impl Into<CacheKey>) -> Result<bool, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.store
            .exists(&backend_key)
            .await
            .map_err(|err| self.fail("has", Some(&backend_key), err))
    }

    /// Logical negation of [`has`](Self::has).
    pub async fn missing(&self, key: impl Into<CacheKey>) -> Result<bool, CacheError> {
        Ok(!self.has(key).await?)
    }

    /// Remove a key. `true` when a value was actually removed; the Delete
    /// event fires whether or not the key existed.
    pub async fn delete(&self, key: impl Into<CacheKey>) -> Result<bool, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.delete_qualified(&backend_key).await.map_err(|err| {
            self.emit_error("delete", Some(&backend_key), &err);
            err
        })
    }

    /// Clear the entire backend database, not just keys under this client's
    /// prefix.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.store
            .flush_db()
            .await
            .map_err(|err| self.fail("flush", None, err))?;
        self.emit(CacheEventKind::Flush, None, serde_json::Value::Null);
        Ok(())
    }

    // --- advanced operations --------------------------------------------

    /// Look-aside fetch: return the cached value, or compute, store, and
    /// return it.
    ///
    /// `compute` runs at most once per call. There is no cross-call
    /// de-duplication: concurrent calls for the same key may each compute,
    /// and the last stored result wins. A failing `compute` propagates to
    /// the caller without touching the cache.
    pub async fn remember<T, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        ttl: Expiration,
        compute: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let key = key.into();
        if let Some(cached) = self.get(key.clone()).await? {
            return Ok(cached);
        }

        let computed = compute().await?;

        let backend_key = self.keys.build(&key);
        self.put_qualified("remember", &backend_key, &computed, ttl)
            .await
            .map_err(|err| {
                self.emit_error("remember", Some(&backend_key), &err);
                err
            })?;
        Ok(computed)
    }

    /// [`remember`](Self::remember) with no expiration.
    pub async fn remember_forever<T, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        compute: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.remember(key, Expiration::Never, compute).await
    }

    /// Fetch and remove: `get`, then `delete` when a value was found. Two
    /// backend calls, not atomic.
    pub async fn pull<T: DeserializeOwned>(
        &self,
        key: impl Into<CacheKey>,
    ) -> Result<Option<T>, CacheError> {
        let key = key.into();
        let value = self.get::<T>(key.clone()).await?;
        if value.is_some() {
            self.delete(key).await?;
        }
        Ok(value)
    }

    /// Remaining time-to-live of `key`.
    pub async fn ttl(&self, key: impl Into<CacheKey>) -> Result<KeyTtl, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.store
            .ttl(&backend_key)
            .await
            .map_err(|err| self.fail("ttl", Some(&backend_key), err))
    }

    // --- counter operations ---------------------------------------------

    /// Adjust the integer at `key` by `amount` backend-side, creating the
    /// key at the adjustment value when absent. Bypasses the value codec.
    pub async fn increment(
        &self,
        key: impl Into<CacheKey>,
        amount: i64,
    ) -> Result<i64, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.store
            .incr_by(&backend_key, amount)
            .await
            .map_err(|err| self.fail("increment", Some(&backend_key), err))
    }

    /// Counterpart of [`increment`](Self::increment).
    pub async fn decrement(
        &self,
        key: impl Into<CacheKey>,
        amount: i64,
    ) -> Result<i64, CacheError> {
        let backend_key = self.keys.build(&key.into());
        self.store
            .decr_by(&backend_key, amount)
            .await
            .map_err(|err| self.fail("decrement", Some(&backend_key), err))
    }

    // --- batch operations -----------------------------------------------

    /// Fetch many keys in a single backend round trip.
    ///
    /// The result maps backend-qualified keys to their values; entries
    /// missing backend-side map to `None`. An empty key list short-circuits
    /// without a backend call.
    pub async fn many<K, T, I>(&self, keys: I) -> Result<HashMap<String, Option<T>>, CacheError>
    where
        K: Into<CacheKey>,
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
    {
        let backend_keys: Vec<String> = keys
            .into_iter()
            .map(|key| self.keys.build(&key.into()))
            .collect();
        if backend_keys.is_empty() {
            return Ok(HashMap::new());
        }

        let raws = self
            .store
            .get_many(&backend_keys)
            .await
            .map_err(|err| self.fail("many", None, err))?;

        let mut values = HashMap::with_capacity(backend_keys.len());
        for (backend_key, raw) in backend_keys.into_iter().zip(raws) {
            let value = codec::decode::<T>(raw).map_err(|err| {
                self.emit_error("many", Some(&backend_key), &err);
                err
            })?;
            values.insert(backend_key, value);
        }
        Ok(values)
    }

    /// Store many entries with one shared TTL, each as an independent write.
    ///
    /// Not transactional: a failed entry leaves earlier writes in place.
    /// `Ok(true)` only when every write succeeded; any failure emits a
    /// single Error event and the aggregate boolean is the only failure
    /// signal.
    pub async fn put_many<K, T, I>(&self, entries: I, ttl: Expiration) -> Result<bool, CacheError>
    where
        K: Into<CacheKey>,
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
    {
        let mut first_failure = None;

        for (key, value) in entries {
            let backend_key = self.keys.build(&key.into());
            if let Err(err) = self
                .put_qualified("put_many", &backend_key, &value, ttl)
                .await
            {
                tracing::warn!(key = %backend_key, error = %err, "put_many entry failed");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            Some(err) => {
                self.emit_error("put_many", None, &err);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Remove many keys, each as an independent call.
    ///
    /// `Ok(true)` only when every delete succeeded; any failure emits a
    /// single Error event rather than one per key.
    pub async fn delete_multiple<K, I>(&self, keys: I) -> Result<bool, CacheError>
    where
        K: Into<CacheKey>,
        I: IntoIterator<Item = K>,
    {
        let mut first_failure = None;

        for key in keys {
            let backend_key = self.keys.build(&key.into());
            if let Err(err) = self.delete_qualified(&backend_key).await {
                tracing::warn!(key = %backend_key, error = %err, "delete_multiple entry failed");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            Some(err) => {
                self.emit_error("delete_multiple", None, &err);
                Ok(false)
            }
            None => Ok(true),
        }
    }

    // --- unsupported capabilities ---------------------------------------

    /// Tag-scoped invalidation is not implemented; the call always fails,
    /// naming the requested tags.
    pub fn tags<I, T>(&self, names: I) -> Result<Infallible, CacheError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        Err(CacheError::Unsupported {
            feature: "Cache tags",
            detail: format!("requested tags: {}", names.join(", ")),
        })
    }

    // --- events & stats -------------------------------------------------

    /// Register a listener notified of every operation outcome.
    pub fn add_listener(&self, listener: CacheListener) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Remove a listener; unknown ids are a no-op.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id)
    }

    /// Point-in-time hit/miss snapshot.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    // --- internals ------------------------------------------------------

    /// Write path shared by `put`, `add`, `remember`, and `put_many`: SET,
    /// then a follow-up EXPIRE when the TTL resolves finite. Raises without
    /// emitting an Error event; public callers decide the event granularity.
    async fn put_qualified<T: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        backend_key: &str,
        value: &T,
        ttl: Expiration,
    ) -> Result<bool, CacheError> {
        let wire = codec::encode(value)?;
        let ttl_secs = ttl.resolve(self.default_ttl);

        self.store
            .set(backend_key, &wire)
            .await
            .map_err(|err| self.store_error(operation, Some(backend_key), err))?;
        if let Some(secs) = ttl_secs {
            self.store
                .expire(backend_key, secs)
                .await
                .map_err(|err| self.store_error(operation, Some(backend_key), err))?;
        }

        self.emit(
            CacheEventKind::Set,
            Some(backend_key),
            json!({ "ttl": ttl_secs }),
        );
        Ok(true)
    }

    async fn delete_qualified(&self, backend_key: &str) -> Result<bool, CacheError> {
        let removed = self
            .store
            .delete(backend_key)
            .await
            .map_err(|err| self.store_error("delete", Some(backend_key), err))?;
        self.emit(
            CacheEventKind::Delete,
            Some(backend_key),
            json!({ "removed": removed }),
        );
        Ok(removed)
    }

    /// Fold a store failure into the public taxonomy. Connection failures
    /// pass through; command failures become operation errors whose message
    /// embeds the backend-qualified key and the underlying detail.
    fn store_error(
        &self,
        operation: &'static str,
        key: Option<&str>,
        err: StoreError,
    ) -> CacheError {
        match err {
            StoreError::Connection { url, detail } => CacheError::Connection { url, detail },
            StoreError::Command { command, detail } => CacheError::Operation {
                operation,
                key: key.map(str::to_string),
                detail: match key {
                    Some(backend_key) => format!("key `{backend_key}`: {command}: {detail}"),
                    None => format!("{command}: {detail}"),
                },
            },
        }
    }

    /// Wrap a store failure and emit the matching Error event.
    fn fail(&self, operation: &'static str, key: Option<&str>, err: StoreError) -> CacheError {
        let err = self.store_error(operation, key, err);
        self.emit_error(operation, key, &err);
        err
    }

    fn emit_error(&self, operation: &'static str, key: Option<&str>, err: &CacheError) {
        let event = CacheEvent::new(CacheEventKind::Error, key.map(str::to_string))
            .with_metadata(json!({ "operation": operation, "detail": err.to_string() }));
        self.listeners.emit(&event);
    }

    fn emit(&self, kind: CacheEventKind, key: Option<&str>, metadata: serde_json::Value) {
        let event = CacheEvent::new(kind, key.map(str::to_string)).with_metadata(metadata);
        self.listeners.emit(&event);
    }
}
