use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use themis_core::{
    action::{
        ActionRequest, AnalyzeCase, ChatRequest, ExtractText, FormatAsCase, RefineAnalysis,
        SearchLaws,
    },
    data_url::DataUrl,
    types::{ChatTurn, StructuredResult},
};

use crate::{
    error::{ClientError, Result},
    transport::{ClientConfig, FragmentStream, HttpTransport, Transport},
};

/// Typed calls over a [`Transport`].
#[derive(Clone)]
pub struct ThemisClient {
    transport: Arc<dyn Transport>,
}

impl ThemisClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn http(config: ClientConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    async fn call<T: DeserializeOwned>(&self, request: ActionRequest) -> Result<T> {
        let action = request.action();
        let value = self.transport.invoke(&request).await?;
        decode(value).map_err(|e| ClientError::InvalidResponseShape(format!("{action}: {e}")))
    }

    pub async fn analyze_case(&self, case_details: &str, country: &str) -> Result<StructuredResult> {
        self.call(ActionRequest::AnalyzeCase(AnalyzeCase {
            case_details: case_details.to_string(),
            country: country.to_string(),
        }))
        .await
    }

    pub async fn refine_analysis(
        &self,
        analysis: &StructuredResult,
        country: Option<&str>,
        instructions: Option<&str>,
    ) -> Result<StructuredResult> {
        self.call(ActionRequest::RefineAnalysis(RefineAnalysis {
            analysis: analysis.clone(),
            country: country.map(str::to_string),
            instructions: instructions.map(str::to_string),
        }))
        .await
    }

    pub async fn search_laws(&self, query: &str) -> Result<String> {
        self.call(ActionRequest::SearchLaws(SearchLaws {
            query: query.to_string(),
        }))
        .await
    }

    pub async fn chat(
        &self,
        history: Vec<ChatTurn>,
        context: Option<StructuredResult>,
    ) -> Result<String> {
        self.call(ActionRequest::Chat(ChatRequest { history, context }))
            .await
    }

    pub async fn chat_stream(
        &self,
        history: Vec<ChatTurn>,
        context: Option<StructuredResult>,
    ) -> Result<FragmentStream> {
        self.transport
            .stream(&ActionRequest::ChatStream(ChatRequest { history, context }))
            .await
    }

    pub async fn extract_text(&self, image: &DataUrl) -> Result<String> {
        self.call(ActionRequest::ExtractText(ExtractText {
            base64_image: image.to_string(),
        }))
        .await
    }

    pub async fn format_as_case(&self, raw_text: &str, source: &str) -> Result<String> {
        self.call(ActionRequest::FormatAsCase(FormatAsCase {
            raw_text: raw_text.to_string(),
            source: source.to_string(),
        }))
        .await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    serde_json::from_value(value)
}
