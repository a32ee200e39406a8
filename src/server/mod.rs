//! HTTP control surface and SSE push endpoints.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::Result;
use crate::supervisor::Supervisor;
use crate::telemetry::TelemetryStore;

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub store: Arc<TelemetryStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/start", post(routes::start))
        .route("/stop", post(routes::stop))
        .route("/logs", get(routes::logs_stream))
        .route("/metrics", get(routes::metrics_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("backend listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
