use anyhow::Result;
use themis_core::{action::ActionRequest, action::Envelope, provider::LegalProvider};
use tokio_stream::StreamExt;
use tracing::{error, info};

/// Run one typed request against the provider and wrap the outcome.
///
/// Never fails: provider errors, including analysis output that does not
/// match the schema, become an error envelope.
pub async fn dispatch(provider: &dyn LegalProvider, request: ActionRequest) -> Envelope {
    let action = request.action();
    info!(action = %action, "dispatching action");
    let started = std::time::Instant::now();

    let outcome = run(provider, request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(envelope) => {
            info!(action = %action, elapsed_ms, "action completed");
            envelope
        },
        Err(e) => {
            error!(action = %action, elapsed_ms, "action failed: {e:#}");
            Envelope::error(format!("{e:#}"))
        },
    }
}

async fn run(provider: &dyn LegalProvider, request: ActionRequest) -> Result<Envelope> {
    Ok(match request {
        ActionRequest::AnalyzeCase(req) => Envelope::ok(provider.analyze_case(&req).await?),
        ActionRequest::RefineAnalysis(req) => Envelope::ok(provider.refine_analysis(&req).await?),
        ActionRequest::SearchLaws(req) => Envelope::ok(provider.search_laws(&req).await?),
        ActionRequest::Chat(req) => Envelope::ok(provider.chat(&req).await?),
        // One-shot callers of the streaming action get the joined reply.
        ActionRequest::ChatStream(req) => {
            let mut stream = provider.chat_stream(&req).await?;
            let mut reply = String::new();
            while let Some(fragment) = stream.next().await {
                reply.push_str(&fragment?);
            }
            Envelope::ok(reply)
        },
        ActionRequest::ExtractText(req) => Envelope::ok(provider.extract_text(&req).await?),
        ActionRequest::FormatAsCase(req) => Envelope::ok(provider.format_as_case(&req).await?),
    })
}
