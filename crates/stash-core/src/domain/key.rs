//! Logical cache keys and backend key construction.

/// Separator joining the parts of a compound key.
pub const KEY_SEPARATOR: &str = ":";

/// A logical cache key: a single string or an ordered sequence of parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Single(String),
    Parts(Vec<String>),
}

impl CacheKey {
    /// Backend-qualified form: prefix, then parts joined with
    /// [`KEY_SEPARATOR`]. Pure and deterministic.
    pub fn qualified(&self, prefix: &str) -> String {
        match self {
            CacheKey::Single(key) => format!("{prefix}{key}"),
            CacheKey::Parts(parts) => format!("{prefix}{}", parts.join(KEY_SEPARATOR)),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::Single(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::Single(key)
    }
}

impl From<Vec<String>> for CacheKey {
    fn from(parts: Vec<String>) -> Self {
        CacheKey::Parts(parts)
    }
}

impl From<Vec<&str>> for CacheKey {
    fn from(parts: Vec<&str>) -> Self {
        CacheKey::Parts(parts.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for CacheKey {
    fn from(parts: &[&str]) -> Self {
        CacheKey::Parts(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// Builds backend storage keys from logical keys.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn build(&self, key: &CacheKey) -> String {
        key.qualified(&self.prefix)
    }
}
