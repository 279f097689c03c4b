//! Domain types for the cache client.

mod event;
mod expiration;
mod key;
mod stats;

pub use event::{CacheEvent, CacheEventKind, CacheListener, ListenerId};
pub use expiration::{Expiration, KeyTtl};
pub use key::{CacheKey, KEY_SEPARATOR, KeyBuilder};
pub use stats::CacheStats;

pub(crate) use event::ListenerRegistry;
pub(crate) use stats::StatsCounters;
