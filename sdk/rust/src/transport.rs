use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use themis_core::{
    action::{ActionRequest, Envelope},
    stream::{Frame, FrameDecoder, StreamPayload},
};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

// ── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    /// Whole-request timeout for one-shot calls; connect timeout for streams.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read `THEMIS_URL` and `THEMIS_TIMEOUT_S`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("THEMIS_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("THEMIS_TIMEOUT_S")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

// ── Transport ─────────────────────────────────────────────────────────────

/// How requests reach the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// One request, one result. Error envelopes become `RequestFailed`.
    async fn invoke(&self, request: &ActionRequest) -> Result<Value>;

    /// Open a fragment stream for a chat request.
    async fn stream(&self, request: &ActionRequest) -> Result<FragmentStream>;
}

pub struct HttpTransport {
    config: ClientConfig,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// Pull the message out of a failed response body, if it is an envelope.
fn failure_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope::Error { error }) => error,
        _ if body.trim().is_empty() => format!("HTTP {status}"),
        _ => format!("HTTP {status}: {}", body.trim()),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: &ActionRequest) -> Result<Value> {
        let action = request.action();
        debug!(action = %action, "invoking action");
        let response = self
            .http
            .post(self.config.url("/api/gemini"))
            .timeout(self.config.timeout)
            .json(&request.to_raw())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(action = %action, status = %status, "action rejected");
            return Err(ClientError::RequestFailed(failure_message(status, &body)));
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponseShape(format!("not an envelope: {e}")))?;
        envelope.into_result().map_err(|error| {
            warn!(action = %action, "action failed: {error}");
            ClientError::RequestFailed(error)
        })
    }

    async fn stream(&self, request: &ActionRequest) -> Result<FragmentStream> {
        let action = request.action();
        if !action.is_chat() {
            return Err(ClientError::RequestFailed(format!(
                "action {action} cannot be streamed"
            )));
        }
        debug!(action = %action, "opening chat stream");
        let response = self
            .http
            .post(self.config.url("/api/gemini/stream"))
            .json(&request.to_raw())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "chat stream rejected");
            return Err(ClientError::RequestFailed(failure_message(status, &body)));
        }

        let (tx, stream) = FragmentStream::channel(32);
        let token = stream.cancel_token();
        tokio::spawn(read_frames(response, tx, token));
        Ok(stream)
    }
}

/// Decode an event-stream body into fragments until `[DONE]`, an error
/// frame, the end of the body, or cancellation.
async fn read_frames(
    mut response: reqwest::Response,
    tx: mpsc::Sender<Result<String>>,
    token: CancellationToken,
) {
    let mut decoder = FrameDecoder::new();
    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => {
                debug!("chat stream aborted");
                return;
            }
            chunk = response.chunk() => chunk,
        };
        let (frames, body_ended) = match chunk {
            Ok(Some(bytes)) => (decoder.push(&bytes), false),
            // A body that ends without the sentinel is a normal end.
            Ok(None) => (decoder.finish(), true),
            Err(e) => {
                warn!("chat stream broke: {}", e);
                let _ = tx.send(Err(ClientError::RequestFailed(e.to_string()))).await;
                return;
            },
        };
        for frame in frames {
            let data = match frame {
                Frame::Data(data) => data,
                Frame::Done => return,
            };
            match StreamPayload::parse(&data) {
                Ok(StreamPayload::Text { text }) => {
                    if tx.send(Ok(text)).await.is_err() {
                        return;
                    }
                },
                Ok(StreamPayload::Error { error }) => {
                    warn!("chat stream error frame: {error}");
                    let _ = tx.send(Err(ClientError::RequestFailed(error))).await;
                    return;
                },
                Err(e) => warn!("skipping malformed stream frame: {}", e),
            }
        }
        if body_ended {
            debug!("chat stream body ended without sentinel");
            return;
        }
    }
}

// ── FragmentStream ────────────────────────────────────────────────────────

/// Finite, pull-based sequence of chat fragments.
///
/// Dropping the stream or calling [`abort`](Self::abort) stops the
/// underlying network read.
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<String>>,
    token: CancellationToken,
    _guard: DropGuard,
    aborted: bool,
}

impl FragmentStream {
    /// A stream fed by the returned sender. It ends when the sender is
    /// dropped.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let token = CancellationToken::new();
        let stream = Self {
            rx,
            _guard: token.clone().drop_guard(),
            token,
            aborted: false,
        };
        (tx, stream)
    }

    /// A stream that yields `items` and then ends.
    pub fn from_results(items: Vec<Result<String>>) -> Self {
        let (tx, stream) = Self::channel(items.len());
        for item in items {
            let _ = tx.try_send(item);
        }
        stream
    }

    /// Token cancelled when the consumer aborts or drops the stream.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn abort(&mut self) {
        self.aborted = true;
        self.token.cancel();
        self.rx.close();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.aborted {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
