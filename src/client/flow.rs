// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in flow state machine.
//!
//! ## Transitions
//!
//! | State | Event | Next |
//! |-------|-------|------|
//! | LoggedOut | Start | Authenticating |
//! | LoggedOut | SessionRestored | Authenticated |
//! | LoggedOut | SessionMissing | LoggedOut |
//! | LoggedOut | ResetRequested | PasswordResetRequired |
//! | Authenticating | Accepted | Authenticated |
//! | Authenticating | NewPasswordChallenge | NewPasswordRequired |
//! | Authenticating | PasswordResetSignal | PasswordResetRequired |
//! | Authenticating | Rejected | LoggedOut |
//! | NewPasswordRequired | Accepted | Authenticated |
//! | NewPasswordRequired | Rejected | NewPasswordRequired |
//! | PasswordResetRequired | ResetConfirmed | LoggedOut |
//! | PasswordResetRequired | Rejected | PasswordResetRequired |
//! | any but Authenticating | SignOut | LoggedOut |
//!
//! Every other pair is rejected with [`FlowError::InvalidTransition`] and
//! leaves the state unchanged. A confirmed password reset lands in
//! `LoggedOut`: the provider requires a fresh sign-in with the new password.
//!
//! Only one provider call is in flight per controller. If the caller drops
//! an operation before the provider answers, the state rolls back to where
//! the operation started.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::provider::{IdentityProvider, PendingChallenge, ProviderError, ProviderSession, SignInOutcome};
use super::session::{Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFlowState {
    LoggedOut,
    Authenticating,
    NewPasswordRequired,
    PasswordResetRequired,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// Credentials submitted
    Start,
    /// Provider issued tokens
    Accepted,
    NewPasswordChallenge,
    PasswordResetSignal,
    /// Provider refused the step, or the call failed
    Rejected,
    /// Verification code requested by the user
    ResetRequested,
    ResetConfirmed,
    SessionRestored,
    SessionMissing,
    SignOut,
}

impl AuthFlowState {
    pub const ALL: [AuthFlowState; 5] = [
        AuthFlowState::LoggedOut,
        AuthFlowState::Authenticating,
        AuthFlowState::NewPasswordRequired,
        AuthFlowState::PasswordResetRequired,
        AuthFlowState::Authenticated,
    ];

    /// Next state after `event`.
    ///
    /// # Errors
    ///
    /// [`FlowError::InvalidTransition`] if `event` is not defined in this state.
    pub fn on(self, event: AuthEvent) -> Result<AuthFlowState, FlowError> {
        use AuthEvent as E;
        use AuthFlowState as S;

        let next = match (self, event) {
            (S::LoggedOut, E::Start) => S::Authenticating,
            (S::LoggedOut, E::SessionRestored) => S::Authenticated,
            (S::LoggedOut, E::SessionMissing) => S::LoggedOut,
            (S::LoggedOut, E::ResetRequested) => S::PasswordResetRequired,
            (S::Authenticating, E::Accepted) => S::Authenticated,
            (S::Authenticating, E::NewPasswordChallenge) => S::NewPasswordRequired,
            (S::Authenticating, E::PasswordResetSignal) => S::PasswordResetRequired,
            (S::Authenticating, E::Rejected) => S::LoggedOut,
            (S::NewPasswordRequired, E::Accepted) => S::Authenticated,
            (S::NewPasswordRequired, E::Rejected) => S::NewPasswordRequired,
            (S::PasswordResetRequired, E::ResetConfirmed) => S::LoggedOut,
            (S::PasswordResetRequired, E::Rejected) => S::PasswordResetRequired,
            (S::Authenticating, E::SignOut) => {
                return Err(FlowError::InvalidTransition { state: self, event })
            }
            (_, E::SignOut) => S::LoggedOut,
            (state, event) => return Err(FlowError::InvalidTransition { state, event }),
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("{event:?} is not allowed in state {state:?}")]
    InvalidTransition {
        state: AuthFlowState,
        event: AuthEvent,
    },

    #[error("an authentication attempt is already in progress")]
    AttemptInProgress,

    #[error("identity provider did not answer within {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl FlowError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Provider(e) => e.user_message(),
            FlowError::TimedOut(_) => "The sign-in service did not respond in time".to_string(),
            FlowError::AttemptInProgress => "Please wait for the current request".to_string(),
            FlowError::InvalidTransition { .. } => "That action is not available now".to_string(),
        }
    }
}

#[derive(Debug)]
struct FlowInner {
    state: AuthFlowState,
    username: Option<String>,
    challenge: Option<PendingChallenge>,
    message: Option<String>,
    in_flight: bool,
}

/// One pending provider call. Dropping it without [`Attempt::complete`]
/// restores the state the attempt started from.
struct Attempt<'a> {
    inner: &'a Mutex<FlowInner>,
    rollback: Option<AuthFlowState>,
}

impl Attempt<'_> {
    fn complete(mut self) {
        self.rollback = None;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.in_flight = false;
        if let Some(state) = self.rollback.take() {
            debug!(from = ?inner.state, to = ?state, "Abandoned auth attempt rolled back");
            inner.state = state;
        }
    }
}

/// Drives sign-in, new-password and password-reset interactions and keeps
/// the [`SessionStore`] in step with the outcome.
pub struct AuthFlowController {
    provider: Arc<dyn IdentityProvider>,
    session: SessionStore,
    inner: Mutex<FlowInner>,
    timeout: Option<Duration>,
}

impl AuthFlowController {
    pub fn new(provider: Arc<dyn IdentityProvider>, session: SessionStore) -> Self {
        Self {
            provider,
            session,
            inner: Mutex::new(FlowInner {
                state: AuthFlowState::LoggedOut,
                username: None,
                challenge: None,
                message: None,
                in_flight: false,
            }),
            timeout: None,
        }
    }

    /// Fail a provider call that has not answered within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn state(&self) -> AuthFlowState {
        self.lock().state
    }

    /// Username of the current or last attempted sign-in.
    pub fn username(&self) -> Option<String> {
        self.lock().username.clone()
    }

    /// Last user-visible failure message, cleared when a new attempt starts.
    pub fn last_message(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Whether a provider call is pending.
    pub fn is_busy(&self) -> bool {
        self.lock().in_flight
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Startup check: ask the provider whether the previous session is still
    /// valid. A valid session goes straight to `Authenticated` with the
    /// freshly issued token; anything else ends in `LoggedOut`.
    ///
    /// # Errors
    ///
    /// Only state-machine errors; provider failures route to `LoggedOut`.
    pub async fn start(&self) -> Result<AuthFlowState, FlowError> {
        let attempt = self.begin(AuthEvent::SessionRestored, false)?;

        let state = match self.call(self.provider.restore_session()).await {
            Ok(Some(session)) => {
                info!(username = %session.username, "Previous session restored");
                self.establish(session);
                self.apply(AuthEvent::SessionRestored)
            }
            Ok(None) => {
                self.session.clear();
                self.apply(AuthEvent::SessionMissing)
            }
            Err(e) => {
                warn!(error = %e, "Session check failed");
                self.session.clear();
                self.lock().message = Some(e.user_message());
                self.apply(AuthEvent::SessionMissing)
            }
        };

        attempt.complete();
        state
    }

    /// [`start`](Self::start), reduced to whether the session survived.
    ///
    /// # Errors
    ///
    /// As for [`start`](Self::start).
    pub async fn has_valid_session(&self) -> Result<bool, FlowError> {
        Ok(self.start().await? == AuthFlowState::Authenticated)
    }

    /// Submit credentials.
    ///
    /// Returns the resulting state: `Authenticated`, `NewPasswordRequired`
    /// or `PasswordResetRequired`.
    ///
    /// # Errors
    ///
    /// The provider's rejection (state back to `LoggedOut`), a timeout, or a
    /// state-machine error if sign-in is not allowed now.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<AuthFlowState, FlowError> {
        let attempt = self.begin(AuthEvent::Start, true)?;
        self.lock().username = Some(username.to_string());

        let outcome = match self.call(self.provider.sign_in(username, password)).await {
            Ok(SignInOutcome::Authenticated(session)) => {
                self.establish(session);
                self.apply(AuthEvent::Accepted)
            }
            Ok(SignInOutcome::NewPasswordRequired(challenge)) => {
                self.lock().challenge = Some(challenge);
                self.apply(AuthEvent::NewPasswordChallenge)
            }
            Ok(SignInOutcome::PasswordResetRequired) => self.apply(AuthEvent::PasswordResetSignal),
            Err(e) => Err(self.reject(e)),
        };

        attempt.complete();
        outcome
    }

    /// Answer the provider's new-password challenge.
    ///
    /// # Errors
    ///
    /// The provider's rejection (state stays `NewPasswordRequired` for a
    /// retry), a timeout, or a state-machine error outside that state.
    pub async fn submit_new_password(&self, new_password: &str) -> Result<AuthFlowState, FlowError> {
        let attempt = self.begin(AuthEvent::Accepted, false)?;
        let challenge = {
            let inner = self.lock();
            inner.challenge.clone().ok_or(FlowError::InvalidTransition {
                state: inner.state,
                event: AuthEvent::Accepted,
            })?
        };

        let outcome = match self
            .call(self.provider.complete_new_password(&challenge, new_password))
            .await
        {
            Ok(session) => {
                self.establish(session);
                self.apply(AuthEvent::Accepted)
            }
            Err(e) => Err(self.reject(e)),
        };

        attempt.complete();
        outcome
    }

    /// Ask the provider to send a verification code to `username`.
    ///
    /// # Errors
    ///
    /// The provider's rejection (state stays `LoggedOut`), a timeout, or a
    /// state-machine error outside `LoggedOut`.
    pub async fn request_password_reset(&self, username: &str) -> Result<AuthFlowState, FlowError> {
        let attempt = self.begin(AuthEvent::ResetRequested, false)?;
        self.lock().username = Some(username.to_string());

        let outcome = match self.call(self.provider.forgot_password(username)).await {
            Ok(()) => self.apply(AuthEvent::ResetRequested),
            Err(e) => Err(self.reject(e)),
        };

        attempt.complete();
        outcome
    }

    /// Set a new password with the emailed verification code.
    ///
    /// On success the state is `LoggedOut`; sign in again with the new password.
    ///
    /// # Errors
    ///
    /// The provider's rejection (state stays `PasswordResetRequired` for a
    /// retry), a timeout, or a state-machine error outside that state.
    pub async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<AuthFlowState, FlowError> {
        let attempt = self.begin(AuthEvent::ResetConfirmed, false)?;
        let username = {
            let inner = self.lock();
            inner.username.clone().ok_or(FlowError::InvalidTransition {
                state: inner.state,
                event: AuthEvent::ResetConfirmed,
            })?
        };

        let outcome = match self
            .call(self.provider.confirm_password(&username, code, new_password))
            .await
        {
            Ok(()) => self.apply(AuthEvent::ResetConfirmed),
            Err(e) => Err(self.reject(e)),
        };

        attempt.complete();
        outcome
    }

    /// Sign out: clears the session store and the provider's local session.
    ///
    /// # Errors
    ///
    /// [`FlowError::AttemptInProgress`] while a provider call is pending.
    pub async fn sign_out(&self) -> Result<AuthFlowState, FlowError> {
        {
            let mut inner = self.lock();
            if inner.in_flight {
                return Err(FlowError::AttemptInProgress);
            }
            inner.state = inner.state.on(AuthEvent::SignOut)?;
            inner.username = None;
            inner.challenge = None;
            inner.message = None;
        }
        self.session.clear();

        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "Provider sign-out failed");
        }
        info!("Signed out");
        Ok(AuthFlowState::LoggedOut)
    }

    fn lock(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the single in-flight slot for an operation whose outcome is
    /// `event`. With `enter`, the state moves by `event` immediately.
    fn begin(&self, event: AuthEvent, enter: bool) -> Result<Attempt<'_>, FlowError> {
        let mut inner = self.lock();
        if inner.in_flight {
            return Err(FlowError::AttemptInProgress);
        }

        let previous = inner.state;
        let next = previous.on(event)?;
        if enter {
            debug!(from = ?previous, to = ?next, ?event, "Auth flow transition");
            inner.state = next;
        }
        inner.in_flight = true;
        inner.message = None;

        Ok(Attempt {
            inner: &self.inner,
            rollback: Some(previous),
        })
    }

    fn apply(&self, event: AuthEvent) -> Result<AuthFlowState, FlowError> {
        let mut inner = self.lock();
        let next = inner.state.on(event)?;
        debug!(from = ?inner.state, to = ?next, ?event, "Auth flow transition");
        inner.state = next;
        Ok(next)
    }

    fn establish(&self, session: ProviderSession) {
        self.session
            .set(Session::new(session.id_token, session.username.clone()));
        let mut inner = self.lock();
        inner.username = Some(session.username);
        inner.challenge = None;
    }

    fn reject(&self, err: FlowError) -> FlowError {
        let mut inner = self.lock();
        inner.message = Some(err.user_message());
        if let Ok(next) = inner.state.on(AuthEvent::Rejected) {
            inner.state = next;
        }
        warn!(state = ?inner.state, error = %err, "Authentication step failed");
        err
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, FlowError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| FlowError::TimedOut(limit))?
                .map_err(FlowError::from),
            None => request.await.map_err(FlowError::from),
        }
    }
}

impl std::fmt::Debug for AuthFlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlowController")
            .field("state", &self.state())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
