//! Client-side application state as one record of tagged unions.

use std::path::Path;

use themis_core::types::{Message, StructuredResult};
use tracing::{error, info};

use crate::{
    analysis::{refine, run_analysis},
    api::ThemisClient,
    error::ClientError,
    input::CaseInput,
    session::{ChatSession, TurnOutcome},
};

pub const ANALYSIS_ERROR: &str = "Προέκυψε σφάλμα κατά την ανάλυση της υπόθεσης.";
pub const IMAGE_ERROR: &str = "Αποτυχία εξαγωγής κειμένου από την εικόνα.";
pub const FORMAT_ERROR: &str = "Δεν ήταν δυνατή η εξαγωγή περιεχομένου από το URL. \
                                Παρακαλώ αντιγράψτε και επικολλήστε το κείμενο χειροκίνητα.";
pub const SEARCH_ERROR: &str = "Παρουσιάστηκε σφάλμα κατά την αναζήτηση.";
pub const CHAT_ERROR: &str = "Προέκυψε σφάλμα κατά την επικοινωνία με την AI.";
pub const FILE_ERROR: &str = "Μη υποστηριζόμενος τύπος αρχείου.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Analysis,
    Library,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Case,
    Chat,
}

/// What the workspace is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    ReadingImage,
    FormattingCase,
    Analyzing,
    Refining,
    Searching,
    Chatting,
    Failed { message: String },
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

pub struct Workspace {
    client: ThemisClient,
    session: ChatSession,
    view: View,
    mode: InputMode,
    phase: Phase,
    draft: String,
    file_name: Option<String>,
    analysis: Option<StructuredResult>,
    search_result: Option<String>,
}

impl Workspace {
    pub fn new(client: ThemisClient) -> Self {
        let session = ChatSession::new(client.transport());
        Self {
            client,
            session,
            view: View::default(),
            mode: InputMode::default(),
            phase: Phase::default(),
            draft: String::new(),
            file_name: None,
            analysis: None,
            search_result: None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn view(&self) -> View {
        self.view
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn analysis(&self) -> Option<&StructuredResult> {
        self.analysis.as_ref()
    }

    pub fn search_result(&self) -> Option<&str> {
        self.search_result.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    // ── Input ──────────────────────────────────────────────────────────────

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    /// Switch input mode. A displayed analysis is cleared; the chat keeps its
    /// grounding context.
    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
        self.analysis = None;
        self.dismiss_error();
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.phase, Phase::Failed { .. }) {
            self.phase = Phase::Idle;
        }
    }

    /// Load a case file into the draft, OCR-ing images.
    pub async fn load_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.mode = InputMode::Case;
        self.file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        match CaseInput::from_path(path).await {
            Ok(CaseInput::Text(text)) => {
                self.draft = text;
                self.phase = Phase::Idle;
            },
            Ok(CaseInput::Image(image)) => {
                self.phase = Phase::ReadingImage;
                match self.client.extract_text(&image).await {
                    Ok(text) => {
                        self.draft = text;
                        self.phase = Phase::Idle;
                    },
                    Err(e) => self.fail(IMAGE_ERROR, &e),
                }
            },
            Err(e) => self.fail(FILE_ERROR, &e),
        }
    }

    /// Turn scraped article text into a case summary in the draft.
    pub async fn format_source(&mut self, raw_text: &str, source: &str) {
        self.phase = Phase::FormattingCase;
        match self.client.format_as_case(raw_text, source).await {
            Ok(text) => {
                self.draft = text;
                self.phase = Phase::Idle;
            },
            Err(e) => self.fail(FORMAT_ERROR, &e),
        }
    }

    // ── Actions ────────────────────────────────────────────────────────────

    /// Analyse the draft. Blank drafts are ignored.
    pub async fn analyze(&mut self, jurisdiction: &str) {
        let case_text = self.draft.trim().to_string();
        if case_text.is_empty() {
            return;
        }
        self.analysis = None;
        self.phase = Phase::Analyzing;
        match run_analysis(&self.client, &case_text, jurisdiction).await {
            Ok(result) => {
                info!(
                    supporting = result.supporting_points.len(),
                    opposing = result.opposing_points.len(),
                    "analysis ready"
                );
                self.session.set_context(Some(result.clone()));
                self.analysis = Some(result);
                self.draft.clear();
                self.file_name = None;
                self.phase = Phase::Idle;
            },
            Err(e) => self.fail(ANALYSIS_ERROR, &e),
        }
    }

    /// Replace the displayed analysis with a refined one.
    pub async fn refine(&mut self, jurisdiction: Option<&str>, instructions: Option<&str>) {
        let Some(existing) = self.analysis.clone() else {
            return;
        };
        self.phase = Phase::Refining;
        match refine(&self.client, &existing, jurisdiction, instructions).await {
            Ok(result) => {
                self.session.set_context(Some(result.clone()));
                self.analysis = Some(result);
                self.phase = Phase::Idle;
            },
            Err(e) => self.fail(ANALYSIS_ERROR, &e),
        }
    }

    pub async fn search_laws(&mut self, query: &str) {
        if query.trim().is_empty() {
            return;
        }
        self.view = View::Library;
        self.phase = Phase::Searching;
        match self.client.search_laws(query.trim()).await {
            Ok(markdown) => {
                self.search_result = Some(markdown);
                self.phase = Phase::Idle;
            },
            Err(e) => self.fail(SEARCH_ERROR, &e),
        }
    }

    /// Send the draft as a chat message.
    pub async fn send_chat(&mut self) -> TurnOutcome {
        let text = std::mem::take(&mut self.draft);
        if text.trim().is_empty() {
            return TurnOutcome::Ignored;
        }
        self.analysis = None;
        self.phase = Phase::Chatting;
        let outcome = self.session.submit(&text).await;
        self.settle_chat(&outcome);
        outcome
    }

    pub async fn edit_message(&mut self, id: &str, text: &str) -> TurnOutcome {
        self.phase = Phase::Chatting;
        let outcome = self.session.edit(id, text).await;
        self.settle_chat(&outcome);
        outcome
    }

    pub async fn regenerate(&mut self) -> TurnOutcome {
        self.phase = Phase::Chatting;
        let outcome = self.session.regenerate().await;
        self.settle_chat(&outcome);
        outcome
    }

    /// Clear the conversation only.
    pub fn new_chat(&mut self) {
        self.session.reset();
        self.dismiss_error();
    }

    /// Back to a blank case workspace.
    pub fn reset(&mut self) {
        self.draft.clear();
        self.file_name = None;
        self.analysis = None;
        self.session.reset();
        self.mode = InputMode::Case;
        self.phase = Phase::Idle;
    }

    fn settle_chat(&mut self, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Failed(reason) => {
                error!("chat turn failed: {reason}");
                self.phase = Phase::Failed {
                    message: CHAT_ERROR.to_string(),
                };
            },
            _ => self.phase = Phase::Idle,
        }
    }

    fn fail(&mut self, message: &str, cause: &ClientError) {
        error!("{message} ({cause})");
        self.phase = Phase::Failed {
            message: message.to_string(),
        };
    }
}
