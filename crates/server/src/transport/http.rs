//! HTTP transport for the gridline server

use crate::handler;
use axum::Router;
use axum::routing::get;
use gridline::{Gridline, TileSource};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Routes for every endpoint, bound to one shared context.
pub fn router<S: TileSource>(state: Arc<Gridline<S>>) -> Router {
    Router::new()
        .route("/fiber-bbox", get(handler::fiber_bbox::<S>))
        .route("/fiber-bbox/stream", get(handler::fiber_bbox_stream::<S>))
        .route("/power-plants", get(handler::power_plants::<S>))
        .route("/health", get(handler::health::<S>))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn run_server<S: TileSource>(
    listener: tokio::net::TcpListener,
    state: Arc<Gridline<S>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Gridline HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
