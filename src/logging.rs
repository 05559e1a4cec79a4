// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.
//!
//! `RUST_LOG` controls the filter (default `info,tower_http=debug`);
//! `LOG_FORMAT=json` switches to one JSON object per line for log shippers.

use tracing::Span;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

pub const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Install the global subscriber.
///
/// Returns the root span carrying `service = name`; enter it for the
/// lifetime of the process so every event is tagged with the service name.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(format: LogFormat, name: &str) -> Result<Span, TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
    }

    Ok(tracing::info_span!("service", service = %name))
}
