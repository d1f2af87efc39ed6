use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use serde_json::{json, Value};
use themis_core::{
    action::{ActionError, ActionRequest, Envelope, RawRequest},
    stream::{StreamPayload, DONE_SENTINEL},
};
use tokio::sync::mpsc;
use tokio_stream::{
    wrappers::{BroadcastStream, UnboundedReceiverStream},
    StreamExt,
};
use tracing::{debug, warn};

use crate::{dispatch::dispatch, AppState};

// ── Error helpers ─────────────────────────────────────────────────────────

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(Envelope::error(message))).into_response()
}

/// Map a body that failed to parse, or a request that failed to resolve,
/// onto a 400 response.
fn bad_request(e: ActionError) -> Response {
    warn!("rejected request: {e}");
    match e {
        ActionError::InvalidAction(_) => {
            reject(StatusCode::BAD_REQUEST, "Invalid action specified")
        },
        ActionError::InvalidPayload { .. } => reject(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn parse_body(body: Result<Json<RawRequest>, JsonRejection>) -> Result<ActionRequest, Response> {
    let Json(raw) = body.map_err(|e| {
        warn!("malformed request body: {}", e.body_text());
        reject(StatusCode::BAD_REQUEST, format!("Malformed request: {}", e.body_text()))
    })?;
    ActionRequest::parse(raw).map_err(bad_request)
}

// ── Dispatcher ────────────────────────────────────────────────────────────

pub(crate) async fn post_action(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let envelope = dispatch(state.provider.as_ref(), request).await;
    let status = match envelope {
        Envelope::Result { .. } => StatusCode::OK,
        Envelope::Error { .. } => state.error_status,
    };
    (status, Json(envelope)).into_response()
}

pub(crate) async fn method_not_allowed() -> Response {
    reject(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

// ── Chat stream ───────────────────────────────────────────────────────────

/// Stream a chat reply as `data:` frames, always ending with `[DONE]`.
pub(crate) async fn post_stream(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawRequest>, JsonRejection>,
) -> Response {
    let request = match parse_body(body) {
        Ok(ActionRequest::Chat(req) | ActionRequest::ChatStream(req)) => req,
        Ok(other) => {
            return reject(
                StatusCode::BAD_REQUEST,
                format!("Action {} cannot be streamed", other.action()),
            )
        },
        Err(resp) => return resp,
    };

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let provider = Arc::clone(&state.provider);
    tokio::spawn(async move {
        let mut fragments = 0usize;
        match provider.chat_stream(&request).await {
            Ok(mut upstream) => loop {
                let item = tokio::select! {
                    _ = tx.closed() => {
                        debug!(fragments, "client disconnected, dropping upstream");
                        return;
                    }
                    item = upstream.next() => item,
                };
                match item {
                    Some(Ok(text)) => {
                        fragments += 1;
                        if tx.send(StreamPayload::Text { text }.to_json()).is_err() {
                            return;
                        }
                    },
                    Some(Err(e)) => {
                        warn!(fragments, "chat stream failed: {e:#}");
                        let _ = tx.send(StreamPayload::Error { error: format!("{e:#}") }.to_json());
                        break;
                    },
                    None => break,
                }
            },
            Err(e) => {
                warn!("chat stream could not start: {e:#}");
                let _ = tx.send(StreamPayload::Error { error: format!("{e:#}") }.to_json());
            },
        }
        debug!(fragments, "chat stream closed");
        let _ = tx.send(DONE_SENTINEL.to_string());
    });

    let stream = UnboundedReceiverStream::new(rx)
        .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
        .into_response()
}

// ── Health and logs ───────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_s": state.start_time.elapsed().as_secs(),
    }))
}

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before snapshotting the ring so no line falls in between.
    let live = BroadcastStream::new(state.log_tx.subscribe()).filter_map(|r| r.ok());
    let history: Vec<String> = state
        .log_ring
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .cloned()
        .collect();
    let stream = tokio_stream::iter(history)
        .chain(live)
        .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
