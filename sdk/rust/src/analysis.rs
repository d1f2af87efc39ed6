//! One-shot analysis calls used by the workspace.

use themis_core::types::StructuredResult;
use tracing::info;

use crate::{api::ThemisClient, error::Result};

/// Analyse `case_text` under the law of `jurisdiction`. No retry, no partial
/// result.
pub async fn run_analysis(
    client: &ThemisClient,
    case_text: &str,
    jurisdiction: &str,
) -> Result<StructuredResult> {
    info!(jurisdiction, len = case_text.len(), "running case analysis");
    client.analyze_case(case_text, jurisdiction).await
}

/// Ask for an improved version of `existing`. The caller decides where the
/// new result goes; nothing is appended anywhere.
pub async fn refine(
    client: &ThemisClient,
    existing: &StructuredResult,
    jurisdiction: Option<&str>,
    instructions: Option<&str>,
) -> Result<StructuredResult> {
    info!(
        has_instructions = instructions.is_some(),
        "refining case analysis"
    );
    client
        .refine_analysis(existing, jurisdiction, instructions)
        .await
}
