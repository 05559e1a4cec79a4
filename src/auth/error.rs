// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant carries full detail for the server log. None of it crosses
//! the trust boundary: the HTTP response is always the same `403 Token Error`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Body returned for every rejected request.
pub const REJECTION_BODY: &str = "Token Error";

/// Standard-claim check that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimViolation {
    /// `exp` is in the past
    Expired,
    /// `nbf` is in the future
    NotYetValid,
    /// `iss` does not match the configured user pool
    InvalidIssuer,
    /// `aud` does not match the configured client id
    InvalidAudience,
    /// Header names an algorithm other than RS256
    UnsupportedAlgorithm(String),
}

impl std::fmt::Display for ClaimViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimViolation::Expired => write!(f, "token has expired"),
            ClaimViolation::NotYetValid => write!(f, "token is not yet valid"),
            ClaimViolation::InvalidIssuer => write!(f, "token issuer is invalid"),
            ClaimViolation::InvalidAudience => write!(f, "token audience is invalid"),
            ClaimViolation::UnsupportedAlgorithm(alg) => {
                write!(f, "token algorithm {alg} is not allowed")
            }
        }
    }
}

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token was supplied with the request
    MissingToken,
    /// The key set could not be retrieved (network, TLS, HTTP status, bad document)
    Fetch(String),
    /// Token is structurally invalid
    MalformedToken(String),
    /// Token's `kid` is not in the current key set
    UnknownKey(String),
    /// Token signature is invalid
    InvalidSignature,
    /// Signature is fine but a standard claim check failed
    Claim(ClaimViolation),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::Fetch(_) => "jwks_fetch_error",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Claim(ClaimViolation::Expired) => "token_expired",
            AuthError::Claim(ClaimViolation::NotYetValid) => "token_not_yet_valid",
            AuthError::Claim(ClaimViolation::InvalidIssuer) => "invalid_issuer",
            AuthError::Claim(ClaimViolation::InvalidAudience) => "invalid_audience",
            AuthError::Claim(ClaimViolation::UnsupportedAlgorithm(_)) => "unsupported_algorithm",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "No token supplied"),
            AuthError::Fetch(msg) => write!(f, "Failed to fetch JWKS: {msg}"),
            AuthError::MalformedToken(msg) => write!(f, "Token is malformed: {msg}"),
            AuthError::UnknownKey(kid) => write!(f, "No key with id {kid} in JWKS"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::Claim(violation) => write!(f, "Claim check failed: {violation}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), REJECTION_BODY).into_response()
    }
}
