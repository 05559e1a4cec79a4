// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, IdentityContext};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HiResponse {
    pub user_info: IdentityContext,
}

/// Echo the caller's identity.
#[utoipa::path(
    get,
    path = "/api/hi",
    tag = "Identity",
    params(("_jwt" = Option<String>, Query, description = "Id token, if not sent as a bearer header")),
    responses(
        (status = 200, description = "Authenticated caller", body = HiResponse),
        (status = 403, description = "Token Error", body = String, content_type = "text/plain")
    ),
    security(("bearer_auth" = []))
)]
pub async fn hi(Identity(user): Identity) -> Json<HiResponse> {
    Json(HiResponse { user_info: user })
}

/// Same as `GET /api/hi`, token accepted as a JSON body field.
#[utoipa::path(
    post,
    path = "/api/hi",
    tag = "Identity",
    responses(
        (status = 200, description = "Authenticated caller", body = HiResponse),
        (status = 403, description = "Token Error", body = String, content_type = "text/plain")
    ),
    security(("bearer_auth" = []))
)]
pub async fn hi_post(identity: Identity) -> Json<HiResponse> {
    hi(identity).await
}
