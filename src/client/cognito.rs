// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cognito user-pool client over the identity-provider JSON API.
//!
//! Every operation is a `POST` to the regional endpoint with
//! `X-Amz-Target: AWSCognitoIdentityProviderService.<Operation>`. Errors come
//! back as `{"__type": "<Name>Exception", "message": "..."}`.
//!
//! The last signed-in user's refresh token is kept in memory and, when a
//! credential file is configured, on disk, so a restarted client can
//! restore its session without asking for the password again.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::provider::{
    IdentityProvider, PendingChallenge, ProviderError, ProviderSession, SignInOutcome,
};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";
const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";
const PASSWORD_RESET_REQUIRED: &str = "PasswordResetRequiredException";
const NOT_AUTHORIZED: &str = "NotAuthorizedException";

/// Refresh credentials remembered between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredentials {
    username: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
    #[serde(default)]
    session: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// Cognito user-pool [`IdentityProvider`].
#[derive(Debug)]
pub struct CognitoClient {
    endpoint: String,
    client_id: String,
    http: Client,
    credentials: Mutex<Option<StoredCredentials>>,
    credential_file: Option<PathBuf>,
}

impl CognitoClient {
    /// Create a client for the pool app `client_id` in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub fn new(region: &str, client_id: impl Into<String>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("https://cognito-idp.{region}.amazonaws.com/"),
            client_id: client_id.into(),
            http,
            credentials: Mutex::new(None),
            credential_file: None,
        })
    }

    /// Send requests to `endpoint` instead of the regional URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Persist refresh credentials to `path`.
    pub fn with_credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_file = Some(path.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: Value) -> Result<T, ProviderError> {
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("unserializable request: {e}")))?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::InvalidResponse(format!("{operation} response: {e}"))
        })
    }

    async fn remember(&self, username: &str, refresh_token: &str) {
        let stored = StoredCredentials {
            username: username.to_string(),
            refresh_token: refresh_token.to_string(),
        };

        if let Some(path) = &self.credential_file {
            match serde_json::to_vec(&stored) {
                Ok(bytes) => {
                    if let Err(e) = tokio::fs::write(path, bytes).await {
                        warn!(path = %path.display(), error = %e, "Failed to persist credentials");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize credentials"),
            }
        }

        *self.credentials.lock().unwrap_or_else(PoisonError::into_inner) = Some(stored);
    }

    async fn forget(&self) {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(path) = &self.credential_file {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove credentials"),
            }
        }
    }

    async fn stored_credentials(&self) -> Option<StoredCredentials> {
        let cached = self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if cached.is_some() {
            return cached;
        }

        let path = self.credential_file.as_ref()?;
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<StoredCredentials>(&bytes) {
            Ok(stored) => {
                *self.credentials.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(stored.clone());
                Some(stored)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable credential file");
                None
            }
        }
    }

    async fn establish(
        &self,
        username: &str,
        result: AuthenticationResult,
    ) -> ProviderSession {
        if let Some(refresh_token) = &result.refresh_token {
            self.remember(username, refresh_token).await;
        }
        ProviderSession {
            username: username.to_string(),
            id_token: result.id_token,
            refresh_token: result.refresh_token,
        }
    }
}

fn parse_error(status: u16, bytes: &[u8]) -> ProviderError {
    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(body) if !body.error_type.is_empty() => {
            // Some endpoints return "com.amazonaws...#NotAuthorizedException"
            let code = body
                .error_type
                .rsplit('#')
                .next()
                .unwrap_or(&body.error_type)
                .to_string();
            ProviderError::Challenge {
                code,
                message: body.message,
            }
        }
        _ => ProviderError::Transport(format!("HTTP {status} from identity provider")),
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutcome, ProviderError> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": username,
                "PASSWORD": password
            }
        });

        let response: AuthResponse = match self.call("InitiateAuth", body).await {
            Ok(response) => response,
            Err(ProviderError::Challenge { code, .. }) if code == PASSWORD_RESET_REQUIRED => {
                info!(username, "Password reset required");
                return Ok(SignInOutcome::PasswordResetRequired);
            }
            Err(e) => return Err(e),
        };

        if let Some(result) = response.authentication_result {
            info!(username, "Signed in");
            return Ok(SignInOutcome::Authenticated(self.establish(username, result).await));
        }

        match (response.challenge_name.as_deref(), response.session) {
            (Some(NEW_PASSWORD_REQUIRED), Some(session)) => {
                debug!(username, "New password challenge issued");
                Ok(SignInOutcome::NewPasswordRequired(PendingChallenge {
                    username: username.to_string(),
                    session,
                }))
            }
            (Some(other), _) => Err(ProviderError::Challenge {
                code: other.to_string(),
                message: format!("Unsupported sign-in challenge {other}"),
            }),
            (None, _) => Err(ProviderError::InvalidResponse(
                "InitiateAuth returned neither tokens nor a challenge".to_string(),
            )),
        }
    }

    async fn complete_new_password(
        &self,
        challenge: &PendingChallenge,
        new_password: &str,
    ) -> Result<ProviderSession, ProviderError> {
        let body = json!({
            "ChallengeName": NEW_PASSWORD_REQUIRED,
            "ClientId": self.client_id,
            "Session": challenge.session,
            "ChallengeResponses": {
                "USERNAME": challenge.username,
                "NEW_PASSWORD": new_password
            }
        });

        let response: AuthResponse = self.call("RespondToAuthChallenge", body).await?;
        let result = response.authentication_result.ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "challenge answered with {:?} instead of tokens",
                response.challenge_name
            ))
        })?;

        info!(username = %challenge.username, "New password accepted");
        Ok(self.establish(&challenge.username, result).await)
    }

    async fn confirm_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": code,
            "Password": new_password
        });

        self.call::<Empty>("ConfirmForgotPassword", body).await?;
        info!(username, "Password reset confirmed");
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<(), ProviderError> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": username
        });

        self.call::<Value>("ForgotPassword", body).await?;
        info!(username, "Verification code requested");
        Ok(())
    }

    async fn restore_session(&self) -> Result<Option<ProviderSession>, ProviderError> {
        let Some(stored) = self.stored_credentials().await else {
            return Ok(None);
        };

        let body = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "REFRESH_TOKEN": stored.refresh_token
            }
        });

        let response: AuthResponse = match self.call("InitiateAuth", body).await {
            Ok(response) => response,
            Err(ProviderError::Challenge { code, message }) if code == NOT_AUTHORIZED => {
                debug!(username = %stored.username, %message, "Stored session no longer valid");
                self.forget().await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(result) = response.authentication_result else {
            return Ok(None);
        };

        Ok(Some(ProviderSession {
            username: stored.username,
            id_token: result.id_token,
            refresh_token: result.refresh_token.or(Some(stored.refresh_token)),
        }))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.forget().await;
        Ok(())
    }
}
