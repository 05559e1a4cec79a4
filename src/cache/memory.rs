// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process LRU cache backend.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::{CacheBackend, CacheError};

/// Default number of distinct keys held before eviction.
const DEFAULT_CAPACITY: usize = 64;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// LRU-bounded in-memory backend with per-entry expiry.
pub struct MemoryBackend {
    cache: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryBackend {
    /// Create a backend holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Number of live (possibly expired, not yet evicted) entries.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| CacheError::Internal("memory cache lock poisoned".to_string()))?;

        if let Some(entry) = cache.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            // Expired, drop it
            cache.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| CacheError::Internal("memory cache lock poisoned".to_string()))?;

        cache.put(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
