use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Analysis ─────────────────────────────────────────────────────────────

/// A single statute, article or precedent cited by an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    /// Name, number or title of the article (e.g. "Αστικός Κώδικας § 914").
    pub label: String,
    /// Markdown explanation of how the article applies to the case.
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// The structured output of a case analysis.
///
/// Immutable once produced. Refining an analysis yields a new value that
/// replaces the displayed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResult {
    pub summary: String,
    /// Articles supporting the plaintiff (or the prosecution).
    pub supporting_points: Vec<ArticleRef>,
    /// Articles supporting the defendant.
    pub opposing_points: Vec<ArticleRef>,
}

impl StructuredResult {
    /// Render as Markdown, used when an analysis has to travel as plain text
    /// (chat history, grounding context).
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Περίληψη Υπόθεσης\n\n");
        out.push_str(self.summary.trim());
        out.push('\n');
        push_articles(&mut out, "Άρθρα υπέρ του ενάγοντος", &self.supporting_points);
        push_articles(&mut out, "Άρθρα υπέρ του εναγομένου", &self.opposing_points);
        out
    }
}

fn push_articles(out: &mut String, heading: &str, articles: &[ArticleRef]) {
    if articles.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {heading}\n"));
    for a in articles {
        out.push_str(&format!("\n### {}\n{}\n", a.label, a.explanation.trim()));
        if let Some(link) = &a.link {
            out.push_str(&format!("{link}\n"));
        }
    }
}

// ── Conversation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

/// Lifecycle of a transcript message. User messages are created `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    /// AI placeholder, no content yet.
    Pending,
    /// At least one fragment applied; more may follow.
    Streaming,
    Complete,
}

impl MessageState {
    pub fn in_progress(self) -> bool {
        !matches!(self, Self::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Structured(StructuredResult),
}

impl MessageBody {
    /// Plain-text form of the body, as sent in chat history.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Structured(r) => r.to_markdown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(flatten)]
    pub body: MessageBody,
    pub state: MessageState,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Text content, or an empty string for structured bodies.
    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::Text(s) => s,
            MessageBody::Structured(_) => "",
        }
    }

    pub fn is_complete_user(&self) -> bool {
        self.role == Role::User && self.state == MessageState::Complete
    }

    pub fn is_complete_ai(&self) -> bool {
        self.role == Role::Ai && self.state == MessageState::Complete
    }
}

/// One entry of the plain-text history sent to the backend with a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.body.as_text(),
        }
    }
}

// ── Client preferences ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}
