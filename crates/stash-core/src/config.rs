//! Cache client configuration.

use std::time::Duration;

/// TTL applied when neither the call nor the environment supplies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cache client configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix prepended to every backend key.
    pub prefix: String,
    /// TTL used whenever a per-call TTL is not supplied.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            prefix: std::env::var("CACHE_KEY_PREFIX").unwrap_or_default(),
            default_ttl: Duration::from_secs(
                std::env::var("CACHE_DEFAULT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TTL.as_secs()),
            ),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}
