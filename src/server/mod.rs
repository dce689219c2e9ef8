//! HTTP front end for ad-hoc point predictions.

mod handlers;
mod state;

use axum::routing::get;
use axum::Router;
use state::AppState;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::error::Result;
use crate::pipeline::EnrichmentPipeline;

pub use handlers::DEFAULT_RADIUS_M;

pub fn build_router(pipeline: EnrichmentPipeline) -> Router {
    let state = Arc::new(AppState {
        pipeline: Mutex::new(pipeline),
    });

    Router::new()
        .route("/api/predict", get(handlers::predict))
        .route("/api/categories", get(handlers::categories))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(host: &str, port: u16, pipeline: EnrichmentPipeline) -> Result<()> {
    let providers = pipeline.providers();
    let app = build_router(pipeline);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, ?providers, "decor server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
