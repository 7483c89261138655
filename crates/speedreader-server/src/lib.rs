//! REST and WebSocket serving for the OCR pipeline.
//!
//! Endpoints:
//! - `GET /api/health` - plain `Healthy`
//! - `POST /api/ocr` - one raw image body or `multipart/form-data` file
//!   parts; responds with a pretty-printed JSON array preserving input order
//! - `GET /api/ws/ocr` - one binary frame per image in, one text JSON frame
//!   per result out

mod handlers;
mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use speedreader_pipeline::OcrPipeline;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{health, ocr};
pub use ws::ws_ocr;

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: OcrPipeline,
}

impl ApiState {
    #[must_use]
    pub fn new(pipeline: OcrPipeline) -> Self {
        Self { pipeline }
    }
}

/// Build the router with all endpoints.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/ocr", post(handlers::ocr))
        .route("/api/ws/ocr", get(ws::ws_ocr))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("starting OCR server on {addr}");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
