// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key-value cache backends
//!
//! The JWKS key cache persists fetched documents through a [`CacheBackend`]
//! so that several server processes can share one view of the key set.
//!
//! - [`MemoryBackend`] - in-process LRU, used when no shared cache is configured
//! - [`RedisBackend`] - shared Redis instance
//!
//! Backends store opaque strings with an explicit per-entry TTL. An entry
//! past its TTL is never returned.

use std::time::Duration;

use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use memory::MemoryBackend;
pub use redis::{RedisBackend, RedisSettings};

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache configuration invalid: {0}")]
    Configuration(String),

    #[error("cache operation failed: {0}")]
    Internal(String),
}

/// Get/set-with-TTL storage used by the key cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the stored value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
