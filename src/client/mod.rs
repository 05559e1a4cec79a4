// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Module
//!
//! Client side of the user-pool sign-in.
//!
//! [`AuthFlowController`] walks the user through sign-in, a forced
//! new-password challenge or a password reset against an
//! [`IdentityProvider`] ([`CognitoClient`] in production). The resulting id
//! token lands in the [`SessionStore`], from which [`ApiClient`] attaches it
//! to every call to the protected API.

pub mod api;
pub mod cognito;
pub mod flow;
pub mod provider;
pub mod session;

pub use api::{ApiClient, ApiClientError};
pub use cognito::CognitoClient;
pub use flow::{AuthEvent, AuthFlowController, AuthFlowState, FlowError};
pub use provider::{IdentityProvider, PendingChallenge, ProviderError, ProviderSession, SignInOutcome};
pub use session::{Session, SessionStore};
