// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication middleware for Axum.
//!
//! Wrap protected routes with
//! `axum::middleware::from_fn_with_state(authenticator, auth_middleware)`.
//! On success the verified [`IdentityContext`] is inserted into the request
//! extensions; on failure the request is answered with `403 Token Error`
//! and the reason is logged at alert severity.
//!
//! ## Token sources
//!
//! Checked in order:
//! 1. `Authorization: Bearer <token>`
//! 2. query string parameter (default `_jwt`)
//! 3. top-level field of a JSON request body with the same name

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::jwks::KeyCache;
use super::verifier::TokenVerifier;
use super::{AuthError, IdentityContext};

/// Default request parameter carrying the token.
pub const DEFAULT_TOKEN_PARAM: &str = "_jwt";

/// Largest JSON body buffered while looking for the token.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Verifies the token of each inbound request.
#[derive(Clone)]
pub struct Authenticator {
    keys: Arc<KeyCache>,
    jwks_url: String,
    verifier: TokenVerifier,
    token_param: String,
}

impl Authenticator {
    /// Create an authenticator fetching keys for `jwks_url` through `keys`.
    pub fn new(keys: Arc<KeyCache>, jwks_url: impl Into<String>, verifier: TokenVerifier) -> Self {
        Self {
            keys,
            jwks_url: jwks_url.into(),
            verifier,
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
        }
    }

    /// Set the request parameter carrying the token.
    pub fn with_token_param(mut self, param: impl Into<String>) -> Self {
        self.token_param = param.into();
        self
    }

    pub fn token_param(&self) -> &str {
        &self.token_param
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    /// Verify `raw_token` and return the caller's identity.
    ///
    /// Failures are logged here with full detail; callers only ever pass the
    /// error on as the generic rejection.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`]: missing token, key fetch failure, or a
    /// verification failure.
    pub async fn authenticate(&self, raw_token: Option<&str>) -> Result<IdentityContext, AuthError> {
        let result = self.verify(raw_token).await;
        match &result {
            Ok(identity) => debug!(username = %identity.username, "Request authenticated"),
            Err(e) => error!(
                severity = "alert",
                error_code = e.error_code(),
                error = %e,
                "Token Error"
            ),
        }
        result
    }

    async fn verify(&self, raw_token: Option<&str>) -> Result<IdentityContext, AuthError> {
        let token = raw_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let keys = self.keys.get(&self.jwks_url).await?;
        let claims = self.verifier.verify(token, &keys)?;
        Ok(IdentityContext::from(claims))
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("jwks_url", &self.jwks_url)
            .field("verifier", &self.verifier)
            .field("token_param", &self.token_param)
            .finish_non_exhaustive()
    }
}

/// Authentication middleware function.
pub async fn auth_middleware(
    State(auth): State<Authenticator>,
    request: Request,
    next: Next,
) -> Response {
    let (token, mut request) = match extract_token(request, auth.token_param()).await {
        Ok(found) => found,
        Err(e) => {
            error!(severity = "alert", error_code = e.error_code(), error = %e, "Token Error");
            return e.into_response();
        }
    };

    match auth.authenticate(token.as_deref()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Pull the token out of the request, handing back a request whose body is
/// intact for downstream handlers.
async fn extract_token(request: Request, param: &str) -> Result<(Option<String>, Request), AuthError> {
    if let Some(token) = bearer_token(&request) {
        return Ok((Some(token), request));
    }

    if let Some(token) = request.uri().query().and_then(|q| query_param(q, param)) {
        return Ok((Some(token), request));
    }

    if !is_json(&request) {
        return Ok((None, request));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AuthError::MalformedToken(format!("unreadable request body: {e}")))?;

    let token = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get(param).and_then(|t| t.as_str()).map(str::to_string));

    Ok((token, Request::from_parts(parts, Body::from(bytes))))
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

fn query_param(query: &str, param: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == param)
        .map(|(_, value)| value.into_owned())
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}
