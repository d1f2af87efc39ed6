use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use themis_core::types::{ArticleRef, StructuredResult};

/// Analysis as the model emits it (field names fixed by the response schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAnalysis {
    pub case_summary: String,
    pub plaintiff_articles: Vec<WireArticle>,
    pub defendant_articles: Vec<WireArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireArticle {
    pub article: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl From<WireArticle> for ArticleRef {
    fn from(a: WireArticle) -> Self {
        Self {
            label: a.article,
            explanation: a.reasoning,
            link: a.link.filter(|l| !l.trim().is_empty()),
        }
    }
}

pub fn to_wire(result: &StructuredResult) -> WireAnalysis {
    let articles = |points: &[ArticleRef]| {
        points
            .iter()
            .map(|a| WireArticle {
                article: a.label.clone(),
                reasoning: a.explanation.clone(),
                link: a.link.clone(),
            })
            .collect()
    };
    WireAnalysis {
        case_summary: result.summary.clone(),
        plaintiff_articles: articles(&result.supporting_points),
        defendant_articles: articles(&result.opposing_points),
    }
}

/// Parse and validate model output into a [`StructuredResult`].
///
/// Accepts output wrapped in a Markdown code fence. Fails with an
/// "invalid response shape" error when the JSON does not match the schema or
/// the summary is empty.
pub fn parse_analysis(raw: &str) -> Result<StructuredResult> {
    let json = strip_code_fence(raw);
    let wire: WireAnalysis =
        serde_json::from_str(json).context("invalid response shape from the AI model")?;
    if wire.case_summary.trim().is_empty() {
        bail!("invalid response shape from the AI model: empty case summary");
    }
    Ok(StructuredResult {
        summary: wire.case_summary,
        supporting_points: wire.plaintiff_articles.into_iter().map(Into::into).collect(),
        opposing_points: wire.defendant_articles.into_iter().map(Into::into).collect(),
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}
