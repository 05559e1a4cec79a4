// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache layers
//!
//! 1. Process-local snapshot: an immutable `Arc<KeySet>` per source URL,
//!    served without touching the backend until its expiry.
//! 2. [`CacheBackend`]: the raw JWKS document plus its expiry, shared between
//!    server processes when Redis is configured.
//! 3. The JWKS endpoint itself, fetched over HTTPS with certificate and
//!    hostname validation.
//!
//! Entries are keyed by `jwks:<hex sha512(url)>`. An entry is never served
//! at or after its expiry. Concurrent misses for the same URL share one
//! in-flight load; only its leader talks to the backend or the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::AuthError;
use crate::cache::CacheBackend;

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Public signing keys from one JWKS document, indexed by key id.
///
/// Built once per fetch and never mutated; a refresh replaces the whole set.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    /// Build from a JWKS document.
    ///
    /// Keys without a `kid`, non-RSA keys and keys advertising an algorithm
    /// other than RS256 are skipped: they could never verify an accepted token.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(|jwk| match rsa_decoding_key(jwk) {
                Some(entry) => Some(entry),
                None => {
                    debug!(kid = ?jwk.common.key_id, "Skipping unusable JWK");
                    None
                }
            })
            .collect();
        Self { keys }
    }

    /// Look up a key by id.
    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids in this set, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("key_ids", &self.key_ids())
            .finish()
    }
}

fn rsa_decoding_key(jwk: &Jwk) -> Option<(String, DecodingKey)> {
    let kid = jwk.common.key_id.clone()?;
    if let Some(alg) = jwk.common.key_algorithm {
        if alg != KeyAlgorithm::RS256 {
            return None;
        }
    }
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .ok()
            .map(|key| (kid, key)),
        _ => None,
    }
}

/// What the backend stores per source URL.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    keys: JwkSet,
    expires_at_ms: i64,
}

struct Snapshot {
    keys: Arc<KeySet>,
    expires_at_ms: i64,
}

type LoadSlot = Arc<OnceCell<Result<Arc<KeySet>, AuthError>>>;

/// Stable backend key for a JWKS source URL.
pub fn cache_key(url: &str) -> String {
    format!("jwks:{:x}", Sha512::digest(url.as_bytes()))
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// JWKS cache with single-flight loading.
pub struct KeyCache {
    backend: Arc<dyn CacheBackend>,
    http: reqwest::Client,
    ttl: Duration,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    in_flight: Mutex<HashMap<String, LoadSlot>>,
}

impl KeyCache {
    /// Create a key cache over `backend` with the default TTL.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            backend,
            http,
            ttl: DEFAULT_CACHE_TTL,
            snapshots: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Use a caller-supplied HTTP client (proxy settings, shared pool).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the key set published at `url`.
    ///
    /// Served from the local snapshot while it is fresh. Otherwise every
    /// concurrent caller for the same URL waits on one shared load.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Fetch`] if no fresh cached copy exists and the
    /// document cannot be retrieved or parsed.
    pub async fn get(&self, url: &str) -> Result<Arc<KeySet>, AuthError> {
        let key = cache_key(url);
        if let Some(keys) = self.fresh_snapshot(&key) {
            return Ok(keys);
        }

        let slot = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.entry(key.clone()).or_default().clone()
        };

        let result = slot.get_or_init(|| self.load(url, &key)).await.clone();

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                in_flight.remove(&key);
            }
        }

        result
    }

    /// Force a refetch from the endpoint, replacing any cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Fetch`] if the endpoint cannot be reached.
    pub async fn refresh(&self, url: &str) -> Result<Arc<KeySet>, AuthError> {
        let key = cache_key(url);
        self.fetch_and_store(url, &key).await
    }

    /// Whether a fresh key set for `url` is held locally.
    pub fn is_cached(&self, url: &str) -> bool {
        self.fresh_snapshot(&cache_key(url)).is_some()
    }

    fn fresh_snapshot(&self, key: &str) -> Option<Arc<KeySet>> {
        let snapshots = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        snapshots
            .get(key)
            .filter(|s| now_ms() < s.expires_at_ms)
            .map(|s| s.keys.clone())
    }

    fn install(&self, key: &str, entry: &CacheEntry) -> Arc<KeySet> {
        let keys = Arc::new(KeySet::from_jwks(&entry.keys));
        let mut snapshots = self.snapshots.write().unwrap_or_else(PoisonError::into_inner);
        snapshots.insert(
            key.to_string(),
            Snapshot {
                keys: keys.clone(),
                expires_at_ms: entry.expires_at_ms,
            },
        );
        keys
    }

    async fn load(&self, url: &str, key: &str) -> Result<Arc<KeySet>, AuthError> {
        // A previous leader may have finished between our snapshot check and
        // taking the slot.
        if let Some(keys) = self.fresh_snapshot(key) {
            return Ok(keys);
        }

        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if now_ms() < entry.expires_at_ms => {
                    debug!(url, "JWKS served from shared cache");
                    return Ok(self.install(key, &entry));
                }
                Ok(_) => debug!(url, "Shared JWKS entry expired"),
                Err(e) => warn!(url, error = %e, "Discarding unreadable JWKS cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(url, error = %e, "JWKS cache backend read failed"),
        }

        self.fetch_and_store(url, key).await
    }

    async fn fetch_and_store(&self, url: &str, key: &str) -> Result<Arc<KeySet>, AuthError> {
        let jwks = self.fetch(url).await?;
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let entry = CacheEntry {
            keys: jwks,
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        };

        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.backend.set(key, raw, self.ttl).await {
                    warn!(url, error = %e, "JWKS cache backend write failed");
                }
            }
            Err(e) => warn!(url, error = %e, "Failed to serialize JWKS cache entry"),
        }

        let keys = self.install(key, &entry);
        info!(url, keys = keys.len(), "Fetched JWKS");
        Ok(keys)
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Fetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::Fetch(e.to_string()))
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
