//! Health API Server
//!
//! HTTP surface that lets load balancers and operators see whether the
//! datastore link is usable.

use crate::application::ConnectionManager;
use crate::domain::entities::ConnectionState;
use crate::domain::ports::Datastore;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub datastore: String,
    pub connection: ConnectionState,
}

/// Connection status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub reconnecting: bool,
    pub shutting_down: bool,
    pub connection: ConnectionState,
}

/// Health API server.
pub struct ApiServer<D: Datastore> {
    listen_addr: String,
    manager: ConnectionManager<D>,
}

impl<D: Datastore> ApiServer<D> {
    pub fn new(listen_addr: String, manager: ConnectionManager<D>) -> Self {
        Self {
            listen_addr,
            manager,
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        Router::new()
            // Live probe of the datastore
            .route("/health", get(health_handler::<D>))
            // Cached connection state, no I/O
            .route("/status", get(status_handler::<D>))
            .layer(TraceLayer::new_for_http())
            .with_state(self.manager.clone())
    }

    /// Bind and serve until shutdown begins.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("health API listening on {}", self.listen_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown begins.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let shutdown = self.manager.shutdown_controller().clone();

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("health API stopped");
        Ok(())
    }
}

// Handler functions

async fn health_handler<D: Datastore>(
    State(manager): State<ConnectionManager<D>>,
) -> impl IntoResponse {
    let datastore = manager.datastore().kind().to_string();

    let (code, status) = if manager.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else if manager.health_check().await {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        datastore,
        connection: manager.state(),
    };
    (code, Json(response))
}

async fn status_handler<D: Datastore>(
    State(manager): State<ConnectionManager<D>>,
) -> impl IntoResponse {
    Json(StatusResponse {
        connected: manager.is_connected(),
        reconnecting: manager.is_reconnecting(),
        shutting_down: manager.is_shutting_down(),
        connection: manager.state(),
    })
}
