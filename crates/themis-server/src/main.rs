use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
};

use axum::http::StatusCode;
use themis_agent::GeminiBackend;
use themis_core::config::Config;
use themis_server::{app, logging::BroadcastLayer, AppState};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "themis_server=info,themis_agent=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _log_rx) = broadcast::channel::<String>(256);
    let log_ring = Arc::new(Mutex::new(VecDeque::new()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Config::from_env()?;
    let error_status = StatusCode::from_u16(config.provider_error_status)?;

    let backend = GeminiBackend::from_config(&config);
    info!(
        model = %backend.model,
        search_grounding = backend.search_grounding,
        "gemini provider ready"
    );

    let state = Arc::new(
        AppState::new(Arc::new(backend))
            .with_logs(log_tx, log_ring)
            .with_error_status(error_status),
    );

    let static_dir = if Path::new(&config.static_dir).is_dir() {
        Some(config.static_dir.as_str())
    } else {
        warn!(dir = %config.static_dir, "static directory not found, UI disabled");
        None
    };
    let app = app(state, static_dir);

    let addr = config.listen_addr();
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
