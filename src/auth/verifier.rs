// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT signature and claim verification against a [`KeySet`].
//!
//! ## Security
//!
//! - RS256 is the only accepted algorithm, whatever the header says
//! - The signing key is looked up by `kid` only; an unknown `kid` fails
//!   without a refetch
//! - `exp` and `iss` are always checked; `aud` when a client id is configured
//! - `exp` is compared against the current time with no tolerance unless a
//!   leeway is set with [`TokenVerifier::with_leeway`]

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use super::claims::Claims;
use super::error::{AuthError, ClaimViolation};
use super::jwks::KeySet;

/// Default clock skew tolerance, in seconds.
const CLOCK_SKEW_LEEWAY: u64 = 0;

/// The single allow-listed signing algorithm.
const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies id tokens issued by one user pool.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    audience: Option<String>,
    leeway: u64,
}

impl TokenVerifier {
    /// Create a verifier expecting tokens from `issuer`.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    /// Set the expected audience (app client id).
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Override the clock skew tolerance, in seconds.
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `token` against `keys` and return its claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] if the token cannot be parsed or lacks a `kid`
    /// - [`AuthError::Claim`] for a disallowed algorithm or a failed `exp`/`nbf`/`iss`/`aud` check
    /// - [`AuthError::UnknownKey`] if `kid` is not in `keys`
    /// - [`AuthError::InvalidSignature`] if the signature does not verify
    pub fn verify(&self, token: &str, keys: &KeySet) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        if header.alg != ALLOWED_ALGORITHM {
            return Err(AuthError::Claim(ClaimViolation::UnsupportedAlgorithm(
                format!("{:?}", header.alg),
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthError::MalformedToken("token header has no kid".to_string()))?;

        let key = keys.get(&kid).ok_or(AuthError::UnknownKey(kid))?;

        let mut validation = Validation::new(ALLOWED_ALGORITHM);
        validation.leeway = self.leeway;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        if let Some(ref audience) = self.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Claim(ClaimViolation::Expired),
            ErrorKind::ImmatureSignature => AuthError::Claim(ClaimViolation::NotYetValid),
            ErrorKind::InvalidIssuer => AuthError::Claim(ClaimViolation::InvalidIssuer),
            ErrorKind::InvalidAudience => AuthError::Claim(ClaimViolation::InvalidAudience),
            ErrorKind::InvalidAlgorithm => AuthError::Claim(
                ClaimViolation::UnsupportedAlgorithm("mismatched key algorithm".to_string()),
            ),
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::MalformedToken(e.to_string()),
        })?;

        Ok(token_data.claims)
    }
}
