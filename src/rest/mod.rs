// rest/mod.rs — REST trigger surface.
//
// Axum HTTP server bridging external callers to the sync engine.
//
// Endpoints:
//   GET   /api/v1/health
//   GET   /api/v1/tasks
//   PATCH /api/v1/tasks/{external_id}/ice
//   POST  /api/v1/sync

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/tasks", get(routes::tasks::list_tasks))
        .route(
            "/api/v1/tasks/{external_id}/ice",
            patch(routes::tasks::update_ice),
        )
        .route("/api/v1/sync", post(routes::sync::trigger_sync))
        // The task list UI is a browser app on another origin.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
