// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{Authenticator, KeyCache, TokenVerifier};
use crate::cache::{CacheBackend, MemoryBackend};
use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppState {
    pub authenticator: Authenticator,
}

impl AppState {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }

    /// Wire the key cache, verifier and authenticator described by `config`
    /// on top of `backend`.
    pub fn from_config(config: &Config, backend: Arc<dyn CacheBackend>) -> Self {
        let keys = Arc::new(KeyCache::new(backend).with_ttl(config.jwks_ttl));

        let mut verifier = TokenVerifier::new(config.issuer());
        if let Some(client_id) = &config.client_id {
            verifier = verifier.with_audience(client_id.clone());
        }

        let authenticator = Authenticator::new(keys, config.jwks_url.clone(), verifier)
            .with_token_param(config.token_param.clone());
        Self::new(authenticator)
    }

    /// State backed by an in-process key cache.
    pub fn in_memory(config: &Config) -> Self {
        Self::from_config(config, Arc::new(MemoryBackend::default()))
    }
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}
