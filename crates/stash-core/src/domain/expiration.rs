//! Entry expiration policies and TTL inspection.

use std::time::Duration;

/// Expiration policy applied when storing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Use the client's configured default TTL.
    #[default]
    Default,
    /// Expire after the given number of seconds.
    Seconds(u64),
    /// Store without expiration.
    Never,
}

impl Expiration {
    /// Explicit TTL in seconds. Negative values clamp to zero, they are
    /// never rejected.
    pub fn seconds(secs: i64) -> Self {
        Expiration::Seconds(secs.max(0) as u64)
    }

    /// Resolve to the seconds to apply, `None` meaning no expiry.
    pub fn resolve(self, default_ttl: Duration) -> Option<u64> {
        match self {
            Expiration::Default => Some(default_ttl.as_secs()),
            Expiration::Seconds(secs) => Some(secs),
            Expiration::Never => None,
        }
    }
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Expiration::Seconds(ttl.as_secs())
    }
}

impl From<u64> for Expiration {
    fn from(secs: u64) -> Self {
        Expiration::Seconds(secs)
    }
}

/// Remaining time-to-live of a backend key, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after the given duration.
    ExpiresIn(Duration),
}

impl KeyTtl {
    /// Decode the backend TTL reply: -2 missing, -1 persistent, otherwise
    /// seconds remaining.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            secs => KeyTtl::ExpiresIn(Duration::from_secs(secs.max(0) as u64)),
        }
    }
}
