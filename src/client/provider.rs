// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-provider contract consumed by the sign-in flow.

use async_trait::async_trait;

/// Tokens issued for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub username: String,
    /// Bearer token presented to the API
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Provider state carried between a sign-in and its new-password answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub username: String,
    /// Opaque provider session handle
    pub session: String,
}

/// Non-failing results of a sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Authenticated(ProviderSession),
    NewPasswordRequired(PendingChallenge),
    /// The password was reset administratively; a verification code has been sent
    PasswordResetRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the request (`code` is its error name)
    #[error("{code}: {message}")]
    Challenge { code: String, message: String },

    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider response was invalid: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::Challenge { message, .. } => message.clone(),
            ProviderError::Transport(_) => "Unable to reach the sign-in service".to_string(),
            ProviderError::InvalidResponse(_) => {
                "The sign-in service returned an unexpected response".to_string()
            }
        }
    }

    /// Provider error name, if the provider reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Challenge { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// User-pool operations the client relies on.
///
/// Every call completes exactly once, after the provider has answered.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Submit username and password.
    async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutcome, ProviderError>;

    /// Answer a new-password challenge.
    async fn complete_new_password(
        &self,
        challenge: &PendingChallenge,
        new_password: &str,
    ) -> Result<ProviderSession, ProviderError>;

    /// Set a new password using an emailed verification code.
    async fn confirm_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ProviderError>;

    /// Ask the provider to send a verification code.
    async fn forgot_password(&self, username: &str) -> Result<(), ProviderError>;

    /// Re-establish the previous session with freshly issued tokens.
    ///
    /// `Ok(None)` means there is no session or it is no longer valid.
    async fn restore_session(&self) -> Result<Option<ProviderSession>, ProviderError>;

    /// Forget the locally held session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}
