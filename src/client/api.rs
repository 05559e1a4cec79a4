// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound calls to the protected API.
//!
//! The current bearer token travels in the token parameter (`_jwt` by
//! default): as a query parameter on `GET`, merged into the JSON body on
//! `POST`. A `403` from the server is reported as [`ApiClientError::AuthFailed`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::session::SessionStore;
use crate::auth::middleware::DEFAULT_TOKEN_PARAM;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    /// Server rejected the token
    #[error("Auth error")]
    AuthFailed,

    #[error("API returned status {0}")]
    Status(u16),

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// Caller passed a body that cannot carry the token
    #[error("invalid API request: {0}")]
    InvalidRequest(String),

    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

/// HTTP client for the protected API, bound to one [`SessionStore`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    token_param: String,
    session: SessionStore,
    http: Client,
}

impl ApiClient {
    /// # Errors
    ///
    /// [`ApiClientError::InvalidUrl`] for an unparseable base URL,
    /// [`ApiClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self, ApiClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            session,
            http,
        })
    }

    pub fn with_token_param(mut self, name: impl Into<String>) -> Self {
        self.token_param = name.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET path` with `query` plus the token parameter.
    ///
    /// # Errors
    ///
    /// See [`ApiClientError`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiClientError> {
        let mut url = self.url(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
            if let Some(token) = self.session.bearer_token() {
                pairs.append_pair(&self.token_param, &token);
            }
        }
        // An empty query_pairs_mut still leaves a trailing '?'
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self
            .http
            .get(url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| ApiClientError::Transport(e.to_string()))?;

        self.read(response).await
    }

    /// `POST path` with `body` as JSON, the token merged in as a field.
    ///
    /// `body` must be a JSON object or `null`.
    ///
    /// # Errors
    ///
    /// See [`ApiClientError`].
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiClientError> {
        let url = self.url(path)?;
        let mut fields = match body {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                return Err(ApiClientError::InvalidRequest(format!(
                    "request body must be a JSON object, got {other}"
                )))
            }
        };
        if let Some(token) = self.session.bearer_token() {
            fields.insert(self.token_param.clone(), Value::String(token));
        }

        let response = self
            .http
            .post(url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .json(&Value::Object(fields))
            .send()
            .await
            .map_err(|e| ApiClientError::Transport(e.to_string()))?;

        self.read(response).await
    }

    fn url(&self, path: &str) -> Result<Url, ApiClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiClientError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn read<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiClientError> {
        let status = response.status();
        debug!(url = %response.url().path(), status = status.as_u16(), "API response");

        if status == StatusCode::FORBIDDEN {
            warn!(username = ?self.session.username(), "Auth error");
            return Err(ApiClientError::AuthFailed);
        }
        if !status.is_success() {
            return Err(ApiClientError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))
    }
}
