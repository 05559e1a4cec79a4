// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use cognito_gate::{
    api::router,
    cache::{CacheBackend, MemoryBackend, RedisBackend},
    config::Config,
    logging,
    state::AppState,
};
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(2);
    });

    let span = logging::init(config.log_format, &config.log_name)
        .expect("Failed to initialize tracing subscriber");

    run(config).instrument(span).await;
}

async fn run(config: Config) {
    let backend: Arc<dyn CacheBackend> = match &config.redis {
        Some(settings) => match RedisBackend::connect(settings).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-process key cache");
                Arc::new(MemoryBackend::default())
            }
        },
        None => Arc::new(MemoryBackend::default()),
    };

    let state = AppState::from_config(&config, backend);
    info!(
        jwks_url = %config.jwks_url,
        issuer = %config.issuer(),
        audience_checked = config.client_id.is_some(),
        "Token verification configured"
    );

    // Warm the key cache; a failure here only delays readiness
    let auth = &state.authenticator;
    if let Err(e) = auth.key_cache().get(auth.jwks_url()).await {
        warn!(error = %e, "Initial JWKS fetch failed");
    }

    let app = router(state);
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .expect("Failed to parse bind address");

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");

            let handle = Handle::<SocketAddr>::new();
            tokio::spawn({
                let handle = handle.clone();
                async move {
                    shutdown_signal().await;
                    handle.graceful_shutdown(Some(Duration::from_secs(10)));
                }
            });

            info!("Cognito gate listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind listener");

            info!("Cognito gate listening on http://{addr} (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
