use std::sync::{Arc, Mutex};

use themis_core::{
    action::{ActionRequest, ChatRequest},
    chat::{PendingTurn, Transcript},
    types::{Message, StructuredResult},
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// How a chat turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The stream failed; the AI message now holds the fixed error text.
    Failed(String),
    /// Aborted through an [`AbortHandle`]; partial text is kept.
    Interrupted,
    /// Blank input, unknown edit target or nothing to regenerate.
    Ignored,
}

/// Aborts whichever turn of its session is streaming when called.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    /// Install a fresh token for a new turn.
    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }
}

/// A chat transcript bound to a transport.
///
/// Every operation takes `&mut self`, so one session never runs two turns at
/// once. A turn whose future is dropped mid-stream is settled as interrupted
/// when the next operation starts.
pub struct ChatSession {
    transport: Arc<dyn Transport>,
    transcript: Transcript,
    abort: AbortHandle,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            transcript: Transcript::new(),
            abort: AbortHandle::default(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn context(&self) -> Option<&StructuredResult> {
        self.transcript.context()
    }

    pub fn set_context(&mut self, context: Option<StructuredResult>) {
        self.transcript.set_context(context);
    }

    /// Append an analysis to the transcript and ground later turns on it.
    pub fn record_analysis(&mut self, result: StructuredResult) -> String {
        self.transcript.record_analysis(result)
    }

    pub fn reset(&mut self) {
        debug!(messages = self.transcript.len(), "resetting chat session");
        self.transcript.reset();
    }

    pub async fn submit(&mut self, text: &str) -> TurnOutcome {
        self.submit_with(text, |_| {}).await
    }

    /// Like [`submit`](Self::submit), calling `observer` with the AI message
    /// after every change to it.
    pub async fn submit_with(&mut self, text: &str, observer: impl FnMut(&Message)) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::Ignored;
        }
        let turn = self.transcript.begin_submit(text);
        self.run_turn(turn, observer).await
    }

    pub async fn edit(&mut self, id: &str, text: &str) -> TurnOutcome {
        self.edit_with(id, text, |_| {}).await
    }

    pub async fn edit_with(
        &mut self,
        id: &str,
        text: &str,
        observer: impl FnMut(&Message),
    ) -> TurnOutcome {
        if text.trim().is_empty() {
            return TurnOutcome::Ignored;
        }
        match self.transcript.begin_edit(id, text) {
            Some(turn) => self.run_turn(turn, observer).await,
            None => TurnOutcome::Ignored,
        }
    }

    pub async fn regenerate(&mut self) -> TurnOutcome {
        self.regenerate_with(|_| {}).await
    }

    pub async fn regenerate_with(&mut self, observer: impl FnMut(&Message)) -> TurnOutcome {
        match self.transcript.begin_regenerate() {
            Some(turn) => self.run_turn(turn, observer).await,
            None => TurnOutcome::Ignored,
        }
    }

    async fn run_turn(
        &mut self,
        turn: PendingTurn,
        mut observer: impl FnMut(&Message),
    ) -> TurnOutcome {
        let PendingTurn { ai_id, history } = turn;
        let token = self.abort.arm();
        let transport = Arc::clone(&self.transport);
        let request = ActionRequest::ChatStream(ChatRequest {
            history,
            context: self.transcript.context().cloned(),
        });
        info!(ai_id = %ai_id, turns = self.transcript.len(), "starting chat turn");

        let opened = tokio::select! {
            _ = token.cancelled() => None,
            opened = transport.stream(&request) => Some(opened),
        };
        let mut stream = match opened {
            None => return self.settle(&ai_id, TurnOutcome::Interrupted, &mut observer),
            Some(Err(e)) => {
                warn!(ai_id = %ai_id, "chat stream failed to open: {e}");
                return self.settle(&ai_id, TurnOutcome::Failed(e.to_string()), &mut observer);
            },
            Some(Ok(stream)) => stream,
        };

        let mut fragments = 0usize;
        loop {
            let step = tokio::select! {
                _ = token.cancelled() => None,
                item = stream.next() => Some(item),
            };
            match step {
                None => {
                    stream.abort();
                    info!(ai_id = %ai_id, fragments, "chat turn interrupted");
                    return self.settle(&ai_id, TurnOutcome::Interrupted, &mut observer);
                },
                Some(Some(Ok(fragment))) => {
                    fragments += 1;
                    if self.transcript.append_fragment(&ai_id, &fragment) {
                        self.notify(&ai_id, &mut observer);
                    }
                },
                Some(Some(Err(e))) => {
                    warn!(ai_id = %ai_id, fragments, "chat stream failed: {e}");
                    return self.settle(&ai_id, TurnOutcome::Failed(e.to_string()), &mut observer);
                },
                Some(None) => {
                    info!(ai_id = %ai_id, fragments, "chat turn completed");
                    return self.settle(&ai_id, TurnOutcome::Completed, &mut observer);
                },
            }
        }
    }

    /// Apply a terminal outcome to the AI message and report it.
    fn settle(
        &mut self,
        ai_id: &str,
        outcome: TurnOutcome,
        observer: &mut impl FnMut(&Message),
    ) -> TurnOutcome {
        let changed = match &outcome {
            TurnOutcome::Completed => self.transcript.complete(ai_id),
            TurnOutcome::Failed(_) => self.transcript.fail(ai_id),
            TurnOutcome::Interrupted => self.transcript.interrupt(ai_id),
            TurnOutcome::Ignored => false,
        };
        if changed {
            self.notify(ai_id, observer);
        }
        outcome
    }

    fn notify(&self, ai_id: &str, observer: &mut impl FnMut(&Message)) {
        if let Some(msg) = self.transcript.get(ai_id) {
            observer(msg);
        }
    }
}
