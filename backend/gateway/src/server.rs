//! Router assembly and the HTTP listener.

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::handlers;
use crate::state::AppState;

/// Multipart framing and form fields ride on top of the file itself.
const BODY_LIMIT_FACTOR: usize = 2;

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.limits.max_file_size.saturating_mul(BODY_LIMIT_FACTOR);

    let ocr = Router::new()
        .route("/compare", post(handlers::compare))
        .route("/google-vision", post(handlers::google_vision))
        .route("/naver-clova", post(handlers::naver_clova))
        .route("/providers", get(handlers::providers))
        .route("/test-sheet", post(handlers::test_sheet));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1/ocr", ocr)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A panic below a handler becomes a 500 with the panic message as `detail`.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    ApiError::Internal(message).into_response()
}

/// Bind `addr` and serve until the process is stopped.
#[instrument(skip(state))]
pub async fn start_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("OCR comparison API listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
