// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Server-side verification of user-pool id tokens.
//!
//! ## Auth Flow
//!
//! 1. Client signs in against the user pool and holds the id token
//! 2. Client sends the token with every call (`_jwt` parameter or bearer header)
//! 3. Server:
//!    - Fetches the pool JWKS via HTTPS (cached, single-flight)
//!    - Verifies RS256 signature, expiry, issuer, audience
//!    - Extracts `cognito:username` and `email` into an [`IdentityContext`]
//!
//! ## Security
//!
//! - Every failure is answered with the same `403 Token Error`
//! - Failure detail is only logged server-side, at alert severity
//! - An unknown `kid` never triggers a refetch on its own

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use claims::{Claims, IdentityContext};
pub use error::{AuthError, ClaimViolation};
pub use extractor::{Identity, OptionalIdentity};
pub use jwks::{KeyCache, KeySet};
pub use middleware::{auth_middleware, Authenticator};
pub use verifier::TokenVerifier;
