//! Cache events and the listener registry.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// Kind of cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Hit,
    Miss,
    Set,
    Delete,
    Flush,
    Error,
}

impl CacheEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheEventKind::Hit => "hit",
            CacheEventKind::Miss => "miss",
            CacheEventKind::Set => "set",
            CacheEventKind::Delete => "delete",
            CacheEventKind::Flush => "flush",
            CacheEventKind::Error => "error",
        }
    }
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a single cache operation, emitted synchronously to all
/// registered listeners once the outcome is known.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    /// Backend-qualified key, when the operation targets one.
    pub key: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Operation-specific context: round-trip timing, TTL applied, error
    /// detail.
    pub metadata: serde_json::Value,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind, key: Option<String>) -> Self {
        Self {
            kind,
            key,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Callback notified of every cache operation outcome.
pub type CacheListener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The listener set. Emission must never fail the emitting operation: a
/// panicking listener is caught and logged.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, CacheListener)>>,
}

impl ListenerRegistry {
    pub fn add(&self, listener: CacheListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write_guard().push((id, listener));
        id
    }

    /// Removing an unregistered listener is a no-op.
    pub fn remove(&self, id: ListenerId) {
        self.write_guard().retain(|(entry, _)| *entry != id);
    }

    pub fn emit(&self, event: &CacheEvent) {
        // Snapshot under the lock, invoke outside it: a listener that
        // re-enters the registry must not deadlock.
        let snapshot: Vec<CacheListener> = {
            let listeners = self
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(kind = %event.kind, "Cache event listener panicked");
            }
        }
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Vec<(ListenerId, CacheListener)>> {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
