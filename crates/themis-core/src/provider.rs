use anyhow::Result;
use async_trait::async_trait;

use crate::{
    action::{AnalyzeCase, ChatRequest, ExtractText, FormatAsCase, RefineAnalysis, SearchLaws},
    stream::TextStream,
    types::StructuredResult,
};

/// The AI service behind the dispatcher.
///
/// Implementations hold no per-request state and may be called concurrently.
#[async_trait]
pub trait LegalProvider: Send + Sync {
    async fn analyze_case(&self, req: &AnalyzeCase) -> Result<StructuredResult>;

    async fn refine_analysis(&self, req: &RefineAnalysis) -> Result<StructuredResult>;

    /// Look up a statute; returns Markdown.
    async fn search_laws(&self, req: &SearchLaws) -> Result<String>;

    async fn chat(&self, req: &ChatRequest) -> Result<String>;

    /// Streaming chat. The default yields the whole `chat` reply as a single
    /// fragment.
    async fn chat_stream(&self, req: &ChatRequest) -> Result<TextStream> {
        let reply = self.chat(req).await?;
        Ok(Box::pin(tokio_stream::once(Ok(reply))))
    }

    /// OCR an image given as a data URL.
    async fn extract_text(&self, req: &ExtractText) -> Result<String>;

    /// Turn scraped article text into a neutral case summary.
    async fn format_as_case(&self, req: &FormatAsCase) -> Result<String>;
}
