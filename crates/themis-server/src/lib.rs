pub mod dispatch;
pub mod logging;
mod routes;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Instant,
};

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use themis_core::provider::LegalProvider;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::logging::LogRing;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub provider: Arc<dyn LegalProvider>,
    pub start_time: Instant,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: LogRing,
    /// Status sent with an error envelope when the provider fails.
    pub error_status: StatusCode,
}

impl AppState {
    pub fn new(provider: Arc<dyn LegalProvider>) -> Self {
        let (log_tx, _) = broadcast::channel(256);
        Self {
            provider,
            start_time: Instant::now(),
            log_tx,
            log_ring: Arc::new(Mutex::new(VecDeque::new())),
            error_status: StatusCode::OK,
        }
    }

    pub fn with_logs(mut self, log_tx: broadcast::Sender<String>, log_ring: LogRing) -> Self {
        self.log_tx = log_tx;
        self.log_ring = log_ring;
        self
    }

    pub fn with_error_status(mut self, status: StatusCode) -> Self {
        self.error_status = status;
        self
    }
}

// ── Router ────────────────────────────────────────────────────────────────

/// Build the HTTP application. `static_dir`, when given, is served for every
/// path not claimed by the API, with `index.html` as the fallback page.
pub fn app(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    let mut router = Router::new()
        // Dispatcher
        .route(
            "/api/gemini",
            post(routes::post_action).fallback(routes::method_not_allowed),
        )
        .route(
            "/api/gemini/stream",
            post(routes::post_stream).fallback(routes::method_not_allowed),
        )
        // Health
        .route("/api/health", get(routes::health))
        // SSE logs
        .route("/api/logs", get(routes::sse_logs));

    if let Some(dir) = static_dir {
        let serve_dir =
            ServeDir::new(dir).fallback(ServeFile::new(format!("{dir}/index.html")));
        router = router.fallback_service(serve_dir);
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
