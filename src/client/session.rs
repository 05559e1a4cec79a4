// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side session store.
//!
//! Holds the bearer token and signed-in username for one running client.
//! The store never inspects the token; whether a session is still valid is
//! decided by the identity provider through the flow controller.

use std::sync::{Arc, PoisonError, RwLock};

/// Current client session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub bearer_token: Option<String>,
    pub username: Option<String>,
}

impl Session {
    pub fn new(bearer_token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(bearer_token.into()),
            username: Some(username.into()),
        }
    }

    /// Whether a token is held. Says nothing about its validity.
    pub fn is_signed_in(&self) -> bool {
        self.bearer_token.is_some()
    }
}

/// Shared handle to one client's session.
///
/// Clones share state; separate `SessionStore::new()` instances are fully
/// isolated, so tests can run several clients side by side.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session.
    pub fn set(&self, session: Session) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Forget the token and username.
    pub fn clear(&self) {
        self.set(Session::default());
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.current().bearer_token
    }

    pub fn username(&self) -> Option<String> {
        self.current().username
    }
}
