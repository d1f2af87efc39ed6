use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use themis_core::{
    action::{AnalyzeCase, ChatRequest, ExtractText, FormatAsCase, RefineAnalysis, SearchLaws},
    config::Config,
    data_url::DataUrl,
    provider::LegalProvider,
    stream::{Frame, FrameDecoder, TextStream},
    types::StructuredResult,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    analysis::parse_analysis,
    event::{Content, GenerateRequest, GenerateResponse, GenerationConfig, Part},
    instruction,
};

/// Calls Google's Gemini models through the `generateContent` REST API.
///
/// Stateless: every call carries the full prompt, so one backend can serve
/// any number of concurrent requests.
pub struct GeminiBackend {
    pub base_url: String,
    pub model: String,
    api_key: String,
    pub timeout_secs: u64,
    pub analysis_temperature: f32,
    pub format_temperature: f32,
    pub search_grounding: bool,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs: 120,
            analysis_temperature: 0.5,
            format_temperature: 0.2,
            search_grounding: true,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut backend = Self::new(
            &config.gemini_base_url,
            &config.gemini_model,
            &config.gemini_api_key,
        )
        .with_timeout(config.provider_timeout_s);
        backend.analysis_temperature = config.analysis_temperature;
        backend.format_temperature = config.format_temperature;
        backend.search_grounding = config.search_grounding;
        backend
    }

    /// Per-request timeout for one-shot calls. Streams are bounded only by
    /// the connect phase, since a long answer may legitimately take a while.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_search_grounding(mut self, enabled: bool) -> Self {
        self.search_grounding = enabled;
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            method
        )
    }

    /// One-shot call returning the answer text.
    async fn generate(&self, op: &'static str, body: &GenerateRequest) -> Result<String> {
        info!(op, model = %self.model, "calling gemini generateContent");

        let response = self
            .http
            .post(self.endpoint("generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(op, timeout_secs = self.timeout_secs, "gemini request timed out");
                    anyhow!("gemini request timed out after {}s", self.timeout_secs)
                } else {
                    warn!(op, "gemini request failed: {}", e);
                    anyhow!("gemini request failed: {e}")
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(op, status = %status, "gemini returned non-200: {}", body);
            bail!("gemini error {status}: {body}");
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("failed to parse gemini response")?;
        if let Some(reason) = parsed.block_reason() {
            warn!(op, reason, "gemini blocked the prompt");
            bail!("the AI model refused the request ({reason})");
        }

        let text = parsed.text();
        if text.trim().is_empty() {
            warn!(op, "gemini returned an empty answer");
            bail!("the AI model returned an empty answer");
        }
        info!(op, output_len = text.len(), "gemini response received");
        Ok(text)
    }

    async fn generate_analysis(&self, op: &'static str, body: GenerateRequest) -> Result<StructuredResult> {
        let body = body.with_config(GenerationConfig {
            temperature: Some(self.analysis_temperature),
            response_mime_type: Some("application/json".into()),
            response_schema: Some(instruction::analysis_schema()),
        });
        let raw = self.generate(op, &body).await?;
        parse_analysis(&raw).inspect_err(|e| warn!(op, "rejected analysis output: {e:#}"))
    }
}

#[async_trait]
impl LegalProvider for GeminiBackend {
    async fn analyze_case(&self, req: &AnalyzeCase) -> Result<StructuredResult> {
        if req.case_details.trim().is_empty() {
            bail!("case details are empty");
        }
        let body = GenerateRequest::prompt(instruction::analysis_input(req))
            .with_system(instruction::analysis_system(&req.country));
        self.generate_analysis("analyzeCase", body).await
    }

    async fn refine_analysis(&self, req: &RefineAnalysis) -> Result<StructuredResult> {
        let country = req.country.as_deref().unwrap_or("Greece");
        let body = GenerateRequest::prompt(instruction::refine_prompt(req))
            .with_system(instruction::analysis_system(country));
        self.generate_analysis("refineAnalysis", body).await
    }

    async fn search_laws(&self, req: &SearchLaws) -> Result<String> {
        if req.query.trim().is_empty() {
            bail!("search query is empty");
        }
        let body = GenerateRequest::prompt(instruction::search_prompt(req))
            .with_search(self.search_grounding);
        self.generate("searchLaws", &body).await
    }

    async fn chat(&self, req: &ChatRequest) -> Result<String> {
        let body = GenerateRequest::new(instruction::chat_contents(req))
            .with_system(instruction::chat_system(req))
            .with_search(self.search_grounding);
        self.generate("chat", &body).await
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<TextStream> {
        let body = GenerateRequest::new(instruction::chat_contents(req))
            .with_system(instruction::chat_system(req))
            .with_search(self.search_grounding);

        info!(model = %self.model, turns = body.contents.len(), "opening gemini chat stream");

        let response = self
            .http
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("gemini stream request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "gemini stream returned non-200: {}", body);
            bail!("gemini error {status}: {body}");
        }

        let (tx, rx) = mpsc::channel::<Result<String>>(32);
        tokio::spawn(pump_stream(response, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn extract_text(&self, req: &ExtractText) -> Result<String> {
        let image = DataUrl::parse(&req.base64_image)?;
        let body = GenerateRequest::new(vec![Content::user(vec![
            Part::inline(image.mime_type, image.data),
            Part::text(instruction::OCR_PROMPT),
        ])]);
        self.generate("extractText", &body).await
    }

    async fn format_as_case(&self, req: &FormatAsCase) -> Result<String> {
        if req.raw_text.trim().is_empty() {
            bail!("article text is empty");
        }
        let body = GenerateRequest::prompt(instruction::format_case_prompt(req)).with_config(
            GenerationConfig {
                temperature: Some(self.format_temperature),
                ..Default::default()
            },
        );
        self.generate("formatAsCase", &body).await
    }
}

/// Forward text fragments from an upstream SSE body until it ends or the
/// receiver goes away. Dropping `response` closes the upstream connection.
async fn pump_stream(mut response: reqwest::Response, tx: mpsc::Sender<Result<String>>) {
    let mut decoder = FrameDecoder::new();
    let mut fragments = 0usize;
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                warn!(fragments, "gemini stream broke: {}", e);
                let _ = tx.send(Err(anyhow!("gemini stream broke: {e}"))).await;
                return;
            },
        };
        for frame in decoder.push(&chunk) {
            if !forward(frame, &tx, &mut fragments).await {
                debug!(fragments, "stream receiver dropped, closing upstream");
                return;
            }
        }
    }
    for frame in decoder.finish() {
        if !forward(frame, &tx, &mut fragments).await {
            return;
        }
    }
    info!(fragments, "gemini chat stream finished");
}

/// Returns false once the receiver is gone.
async fn forward(frame: Frame, tx: &mpsc::Sender<Result<String>>, fragments: &mut usize) -> bool {
    let data = match frame {
        Frame::Data(data) => data,
        Frame::Done => return true,
    };
    let chunk: GenerateResponse = match serde_json::from_str(&data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("skipping malformed gemini stream frame: {}", e);
            return true;
        },
    };
    if let Some(reason) = chunk.block_reason() {
        let _ = tx
            .send(Err(anyhow!("the AI model refused the request ({reason})")))
            .await;
        return false;
    }
    let text = chunk.text();
    if text.is_empty() {
        return true;
    }
    *fragments += 1;
    tx.send(Ok(text)).await.is_ok()
}
