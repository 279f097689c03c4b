//! # Stash Core
//!
//! The domain layer of the Stash cache client: logical keys, expiration
//! policies, the value codec, the `CacheStore` port, and the typed
//! look-aside [`CacheClient`] built on top of it.
//! This crate contains pure client logic with zero backend dependencies;
//! concrete stores live in `stash-infra`.

pub mod client;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use client::CacheClient;
pub use config::CacheConfig;
pub use error::CacheError;
