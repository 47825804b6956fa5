//! HTTP server exposing the health and status snapshots
//!
//! A thin transport over the logical endpoints in [`crate::health`]:
//! `/health` returns the overall snapshot (503 when unhealthy),
//! `/status/sampling`, `/status/metrics`, and `/status/tracing` return the
//! individual sections.
//!
//! # Example
//!
//! ```rust,no_run
//! use dashweave_observability::health_server::serve_health;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Start health server on port 9091
//! serve_health(9091).await?;
//! # Ok(())
//! # }
//! ```

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::health::{health_snapshot, HealthState};

/// Start an HTTP server serving the health endpoints
///
/// Runs until the process is terminated. Use port 0 to let the OS assign one.
pub async fn serve_health(port: u16) -> Result<()> {
    let (_, server_future) = serve_health_with_addr(port).await?;
    server_future.await
}

/// Start the server and return the actual bound address
///
/// Useful with port 0; returns the bound socket address and a future that
/// runs the server.
pub async fn serve_health_with_addr(
    port: u16,
) -> Result<(
    std::net::SocketAddr,
    impl std::future::Future<Output = Result<()>>,
)> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/status/sampling", get(sampling_handler))
        .route("/status/metrics", get(metrics_handler))
        .route("/status/tracing", get(tracing_handler));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::HealthServer(format!("Failed to bind to {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| Error::HealthServer(format!("Failed to get local addr: {e}")))?;

    tracing::info!("Health server listening on http://{}/health", local_addr);

    let server_future = async move {
        axum::serve(listener, app)
            .await
            .map_err(|e| Error::HealthServer(format!("Server error: {e}")))?;
        Ok(())
    };

    Ok((local_addr, server_future))
}

async fn health_handler() -> impl IntoResponse {
    let snapshot = health_snapshot();
    let code = match snapshot.status {
        HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(snapshot))
}

async fn sampling_handler() -> impl IntoResponse {
    Json(health_snapshot().sampling)
}

async fn metrics_handler() -> impl IntoResponse {
    Json(health_snapshot().metrics)
}

async fn tracing_handler() -> impl IntoResponse {
    Json(health_snapshot().tracing)
}
