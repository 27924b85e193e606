// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use booster_auth::{
    api::router,
    auth::credentials::CredentialError,
    config::{Config, LogFormat},
    state::AppState,
    telemetry,
};
use thiserror::Error;

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to prepare bootstrap credentials: {0}")]
    Credentials(#[from] CredentialError),
    #[error("failed to load TLS certificate or key: {0}")]
    Tls(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            telemetry::init(LogFormat::default());
            tracing::error!(%error, "Refusing to start with invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let state = AppState::from_config(&config)?;
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    let addr = config.bind_addr;
    match &config.tls {
        Some(paths) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
                .await
                .map_err(StartupError::Tls)?;

            tracing::info!(%addr, ttl_secs = config.token_ttl.as_secs(), "Listening on https");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await
                .map_err(StartupError::Serve)
        }
        None => {
            tracing::info!(%addr, ttl_secs = config.token_ttl.as_secs(), "Listening on http");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app)
                .await
                .map_err(StartupError::Serve)
        }
    }
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Shutdown signal received, draining");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
