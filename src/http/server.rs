//! HTTP server startup and shutdown sequencing.

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{AppConfig, ConfigError};
use crate::store::DataStore;

use super::shutdown::ShutdownCoordinator;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    #[error("Invalid listen address: {0}")]
    Address(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(String),
}

/// Bind the configured address, install signal handlers and serve until shutdown.
///
/// This function blocks until the server has stopped and the data store has
/// been released.
pub async fn start_server(
    app: Router,
    config: &AppConfig,
    store: &dyn DataStore,
    coordinator: &ShutdownCoordinator,
) -> Result<(), ServerError> {
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = %config.environment, "Starting HTTP server");

    coordinator.listen_for_signals();

    serve(
        listener,
        app,
        store,
        coordinator,
        config.http.shutdown_grace(),
    )
    .await
}

/// Serve `app` on `listener` until `coordinator` is triggered.
///
/// Once shutdown begins no new connections are accepted and in-flight
/// requests have up to `grace` to complete. The store is then released,
/// whether or not the server stopped cleanly.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    store: &dyn DataStore,
    coordinator: &ShutdownCoordinator,
    grace: Duration,
) -> Result<(), ServerError> {
    let shutdown_signal = {
        let coordinator = coordinator.clone();
        async move { coordinator.triggered().await }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .into_future();
    tokio::pin!(server);

    let drain_deadline = async {
        coordinator.triggered().await;
        tokio::time::sleep(grace).await;
    };

    let result = tokio::select! {
        result = &mut server => result.map_err(|e| ServerError::Server(e.to_string())),
        _ = drain_deadline => {
            tracing::warn!(
                grace_secs = grace.as_secs_f64(),
                "Requests still in flight after grace period, closing anyway"
            );
            Ok(())
        }
    };

    tracing::info!("HTTP server stopped");
    coordinator.release(store).await;
    result
}
