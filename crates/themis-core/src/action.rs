//! The request/response contract between clients and the dispatcher.
//!
//! A request on the wire is `{ "action": "<name>", "payload": { ... } }` and a
//! response is an [`Envelope`]: `{ "result": ... }` or `{ "error": "..." }`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ChatTurn, Role, StructuredResult};

/// Every action the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AnalyzeCase,
    RefineAnalysis,
    SearchLaws,
    Chat,
    ChatStream,
    ExtractText,
    FormatAsCase,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::AnalyzeCase,
        Action::RefineAnalysis,
        Action::SearchLaws,
        Action::Chat,
        Action::ChatStream,
        Action::ExtractText,
        Action::FormatAsCase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalyzeCase => "analyzeCase",
            Self::RefineAnalysis => "refineAnalysis",
            Self::SearchLaws => "searchLaws",
            Self::Chat => "chat",
            Self::ChatStream => "chatStream",
            Self::ExtractText => "extractText",
            Self::FormatAsCase => "formatAsCase",
        }
    }

    /// Whether the action may be served by the streaming endpoint.
    pub fn is_chat(self) -> bool {
        matches!(self, Self::Chat | Self::ChatStream)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyzeCase" => Ok(Self::AnalyzeCase),
            "refineAnalysis" => Ok(Self::RefineAnalysis),
            "searchLaws" => Ok(Self::SearchLaws),
            "chat" | "chatWithAI" => Ok(Self::Chat),
            "chatStream" => Ok(Self::ChatStream),
            "extractText" | "extractTextFromImage" => Ok(Self::ExtractText),
            "formatAsCase" | "formatTextAsCase" => Ok(Self::FormatAsCase),
            other => Err(ActionError::InvalidAction(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid action specified: {0}")]
    InvalidAction(String),
    #[error("Invalid payload for {action}: {source}")]
    InvalidPayload {
        action: Action,
        #[source]
        source: serde_json::Error,
    },
}

// ── Payloads ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCase {
    pub case_details: String,
    /// Jurisdiction whose law governs the analysis.
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineAnalysis {
    pub analysis: StructuredResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLaws {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub history: Vec<ChatTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<StructuredResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractText {
    /// A `data:<mime>;base64,<data>` URL.
    pub base64_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatAsCase {
    pub raw_text: String,
    /// Where the text came from (usually a domain name).
    pub source: String,
}

// ── Requests ─────────────────────────────────────────────────────────────

/// A request as it arrives, before the action name is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// A fully typed request: one variant per [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    AnalyzeCase(AnalyzeCase),
    RefineAnalysis(RefineAnalysis),
    SearchLaws(SearchLaws),
    Chat(ChatRequest),
    ChatStream(ChatRequest),
    ExtractText(ExtractText),
    FormatAsCase(FormatAsCase),
}

impl ActionRequest {
    pub fn action(&self) -> Action {
        match self {
            Self::AnalyzeCase(_) => Action::AnalyzeCase,
            Self::RefineAnalysis(_) => Action::RefineAnalysis,
            Self::SearchLaws(_) => Action::SearchLaws,
            Self::Chat(_) => Action::Chat,
            Self::ChatStream(_) => Action::ChatStream,
            Self::ExtractText(_) => Action::ExtractText,
            Self::FormatAsCase(_) => Action::FormatAsCase,
        }
    }

    /// Resolve a raw request: action name first, then the payload shape.
    pub fn parse(raw: RawRequest) -> Result<Self, ActionError> {
        let action: Action = raw.action.parse()?;
        Self::from_parts(action, raw.payload)
    }

    pub fn from_parts(action: Action, payload: Value) -> Result<Self, ActionError> {
        let bad = |source| ActionError::InvalidPayload { action, source };
        Ok(match action {
            Action::AnalyzeCase => Self::AnalyzeCase(serde_json::from_value(payload).map_err(bad)?),
            Action::RefineAnalysis => {
                Self::RefineAnalysis(serde_json::from_value(payload).map_err(bad)?)
            }
            Action::SearchLaws => Self::SearchLaws(serde_json::from_value(payload).map_err(bad)?),
            Action::Chat => Self::Chat(chat_payload(payload).map_err(bad)?),
            Action::ChatStream => Self::ChatStream(chat_payload(payload).map_err(bad)?),
            Action::ExtractText => Self::ExtractText(serde_json::from_value(payload).map_err(bad)?),
            Action::FormatAsCase => {
                Self::FormatAsCase(serde_json::from_value(payload).map_err(bad)?)
            }
        })
    }

    /// Serialize back into the `{action, payload}` wire shape.
    pub fn to_raw(&self) -> RawRequest {
        let payload = match self {
            Self::AnalyzeCase(p) => serde_json::to_value(p),
            Self::RefineAnalysis(p) => serde_json::to_value(p),
            Self::SearchLaws(p) => serde_json::to_value(p),
            Self::Chat(p) | Self::ChatStream(p) => serde_json::to_value(p),
            Self::ExtractText(p) => serde_json::to_value(p),
            Self::FormatAsCase(p) => serde_json::to_value(p),
        };
        RawRequest {
            action: self.action().as_str().to_string(),
            payload: payload.unwrap_or(Value::Null),
        }
    }
}

/// Chat payloads carry `history`; the older single-question form `{query}`
/// becomes a one-turn history.
fn chat_payload(payload: Value) -> Result<ChatRequest, serde_json::Error> {
    if payload.get("history").is_none() {
        if let Some(query) = payload.get("query").and_then(Value::as_str) {
            return Ok(ChatRequest {
                history: vec![ChatTurn {
                    role: Role::User,
                    content: query.to_string(),
                }],
                context: None,
            });
        }
    }
    serde_json::from_value(payload)
}

// ── Responses ────────────────────────────────────────────────────────────

/// The uniform response wrapper of the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Result { result: Value },
    Error { error: String },
}

impl Envelope {
    pub fn ok(result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self::Result { result },
            Err(e) => Self::error(format!("failed to serialize result: {e}")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Self::Result { result } => Ok(result),
            Self::Error { error } => Err(error),
        }
    }
}
