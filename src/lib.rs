// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cognito Gate - user-pool token gate for HTTP APIs
//!
//! Verifies Cognito-issued id tokens on inbound requests and provides the
//! client side of the sign-in flow that obtains them.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, JWKS key cache, request middleware
//! - `cache` - Key cache backends (in-process LRU, Redis)
//! - `client` - Sign-in flow, session store, outbound API client

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod logging;
pub mod state;

#[cfg(test)]
mod test_keys;
