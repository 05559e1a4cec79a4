// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the per-request identity context.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by a user-pool id token.
///
/// Only what the service reads or validates is modelled. `exp`, `iss` and
/// `aud` are checked by the verifier before this struct is handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (stable user id)
    pub sub: String,

    /// Pool username
    #[serde(rename = "cognito:username")]
    pub username: String,

    pub email: String,

    /// Issuer (user pool URL)
    pub iss: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Audience (app client id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// `id` or `access`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

/// Verified identity attached to one request.
///
/// Downstream handlers read it through the [`Identity`](super::Identity)
/// extractor. It lives only as long as the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IdentityContext {
    pub username: String,
    pub email: String,
}

impl From<Claims> for IdentityContext {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.username,
            email: claims.email,
        }
    }
}
