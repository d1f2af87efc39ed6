use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

/// Sentinel payload that terminates a chat stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A lazily produced sequence of text fragments from a provider.
pub type TextStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// One `data:` line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(String),
    Done,
}

/// JSON body of a chat stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamPayload {
    Text { text: String },
    Error { error: String },
}

impl StreamPayload {
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// Encode as the JSON carried after `data: `.
    pub fn to_json(&self) -> String {
        match self {
            Self::Text { text } => serde_json::json!({ "text": text }).to_string(),
            Self::Error { error } => serde_json::json!({ "error": error }).to_string(),
        }
    }
}

/// Full wire form of a text frame, including the blank-line terminator.
pub fn encode_text_frame(text: &str) -> String {
    let payload = StreamPayload::Text {
        text: text.to_string(),
    };
    format!("data: {}\n\n", payload.to_json())
}

pub fn encode_done_frame() -> String {
    format!("data: {DONE_SENTINEL}\n\n")
}

/// Incremental decoder for newline-delimited `data:` frames.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// (including ones inside a multi-byte UTF-8 character) never change the
/// decoded frames. Nothing is yielded after the `[DONE]` sentinel.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes, returning every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        self.buf.extend_from_slice(chunk);
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(frame) = self.decode_line(&line[..line.len() - 1]) {
                frames.push(frame);
                if self.done {
                    self.buf.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.done || self.buf.is_empty() {
            self.buf.clear();
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buf);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<Frame> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = String::from_utf8_lossy(line);
        // Comments (keep-alives) start with ':'; other SSE fields are ignored.
        let data = text.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.trim() == DONE_SENTINEL {
            self.done = true;
            return Some(Frame::Done);
        }
        if data.trim().is_empty() {
            return None;
        }
        Some(Frame::Data(data.to_string()))
    }
}
