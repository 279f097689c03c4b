//! # Stash Infrastructure
//!
//! Concrete implementations of the `CacheStore` port defined in
//! `stash-core`: a Redis store with lazy connection management and an
//! in-memory store used as a test double and fallback.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - Redis store support

pub mod store;

// Re-exports - In-Memory
pub use store::InMemoryStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
