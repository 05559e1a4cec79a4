// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared Redis cache backend.
//!
//! Lets every server process behind a load balancer reuse one fetched JWKS
//! document instead of each fetching its own.

use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;

use super::{CacheBackend, CacheError};

/// Prefix applied to every key written by this service.
const KEY_PREFIX: &str = "cognito-gate";

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl RedisSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Client configuration for a single Redis node.
    ///
    /// The password is handed to the client as-is, never embedded in a URL.
    pub fn client_config(&self) -> Config {
        Config {
            server: ServerConfig::new_centralized(self.host.as_str(), self.port),
            password: self.password.clone(),
            ..Config::default()
        }
    }
}

/// Redis-backed [`CacheBackend`].
pub struct RedisBackend {
    client: Client,
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the initial connection cannot be
    /// established.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let config = settings.client_config();

        let client = Client::new(
            config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );
        client.init().await.map_err(from_redis_error)?;

        tracing::info!(host = %settings.host, port = settings.port, "Connected to Redis cache");
        Ok(Self { client })
    }
}

fn prefixed_key(key: &str) -> String {
    format!("{KEY_PREFIX}:{key}")
}

/// Redis expiry is whole seconds; never round a live entry down to "no TTL".
#[allow(clippy::cast_possible_wrap)]
fn ttl_seconds(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

fn from_redis_error(err: fred::error::Error) -> CacheError {
    match err.kind() {
        fred::error::ErrorKind::IO | fred::error::ErrorKind::Timeout => {
            CacheError::Connection(err.to_string())
        }
        fred::error::ErrorKind::Config => CacheError::Configuration(err.to_string()),
        _ => CacheError::Internal(err.to_string()),
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = prefixed_key(key);
        self.client
            .get::<Option<String>, _>(key.as_str())
            .await
            .map_err(from_redis_error)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let key = prefixed_key(key);
        self.client
            .set::<(), _, _>(
                key.as_str(),
                value,
                Some(Expiration::EX(ttl_seconds(ttl))),
                None,
                false,
            )
            .await
            .map_err(from_redis_error)
    }
}
