// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the verified identity.
//!
//! ```rust,ignore
//! async fn my_handler(Identity(user): Identity) -> impl IntoResponse {
//!     // user is IdentityContext
//! }
//! ```
//!
//! The extractor does no verification of its own: it only reads what
//! [`auth_middleware`](super::middleware::auth_middleware) attached. A route
//! using it without the middleware rejects every request.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, IdentityContext};

/// Extractor for the authenticated caller.
pub struct Identity(pub IdentityContext);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .map(Identity)
            .ok_or(AuthError::MissingToken)
    }
}

/// Optional identity extractor.
///
/// Returns `None` instead of rejecting when no identity is attached.
pub struct OptionalIdentity(pub Option<IdentityContext>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalIdentity(
            parts.extensions.get::<IdentityContext>().cloned(),
        ))
    }
}
