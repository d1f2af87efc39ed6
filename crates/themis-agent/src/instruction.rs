use serde_json::{json, Value};
use themis_core::{
    action::{AnalyzeCase, ChatRequest, FormatAsCase, RefineAnalysis, SearchLaws},
    types::Role,
};

use crate::event::{Content, Part};

const GREEK_ONLY: &str = "Απάντησε αποκλειστικά στα Ελληνικά.";

/// System prompt for a case analysis under `country`'s law.
pub fn analysis_system(country: &str) -> String {
    format!(
        "You are a legal analyst. Analyse the case strictly under the law of {country}.\n\
         - Summarise the facts and the strengths and weaknesses of both sides in `caseSummary`.\n\
         - List the articles of {country} law supporting the plaintiff (or prosecution) in `plaintiffArticles`\n\
           and those supporting the defendant in `defendantArticles`.\n\
         - Each article gets a Markdown `reasoning` tying it to the facts, and a Google search `link`\n\
           whose query is the article itself.\n\
         - Reply with a single JSON object matching the schema.\n\
         {GREEK_ONLY}"
    )
}

pub fn analysis_input(req: &AnalyzeCase) -> String {
    req.case_details.clone()
}

/// Prompt asking for an improved version of an existing analysis.
pub fn refine_prompt(req: &RefineAnalysis) -> String {
    let current = serde_json::to_string_pretty(&crate::analysis::to_wire(&req.analysis))
        .unwrap_or_default();
    let mut prompt = format!(
        "Here is an existing legal analysis as JSON:\n\n{current}\n\n\
         Review it, correct mistakes, add missing articles and sharpen the reasoning.\n"
    );
    if let Some(instructions) = req.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("Additional instructions from the user: {instructions}\n"));
    }
    prompt.push_str("Return the complete revised analysis in the same schema.");
    prompt
}

pub fn search_prompt(req: &SearchLaws) -> String {
    let query = req.query.trim();
    format!(
        "Search the web for the legal provision: \"{query}\".\n\
         Return only the result, no preamble, in exactly this Markdown layout:\n\n\
         ## Αποτελέσματα για: \"{query}\"\n\
         <one or two sentence summary>\n\n\
         ### <Code name>: <Article title>\n\
         <full, unedited article text with its original numbering>\n\n\
         **Πηγή:** <source URL>\n\n\
         ---\n\
         {GREEK_ONLY}"
    )
}

/// System prompt for chat, with the optional analysis as grounding.
pub fn chat_system(req: &ChatRequest) -> String {
    let mut system = format!(
        "You are a helpful legal assistant. Use web search when you need recent or specific \
         information. Format answers in Markdown. {GREEK_ONLY}"
    );
    if let Some(context) = &req.context {
        system.push_str("\n\nThe conversation concerns this case analysis:\n\n");
        system.push_str(&context.to_markdown());
    }
    system
}

/// Map the transcript history onto Gemini's user/model turns.
pub fn chat_contents(req: &ChatRequest) -> Vec<Content> {
    req.history
        .iter()
        .filter(|t| !t.content.trim().is_empty())
        .map(|t| match t.role {
            Role::User => Content::user(vec![Part::text(t.content.clone())]),
            Role::Ai => Content::model(vec![Part::text(t.content.clone())]),
        })
        .collect()
}

pub const OCR_PROMPT: &str =
    "Read and transcribe all text in this image exactly. Keep the original line breaks.";

pub fn format_case_prompt(req: &FormatAsCase) -> String {
    format!(
        "Turn the news text below into a short, neutral case summary.\n\
         - Start with the heading \"Περίληψη Υπόθεσης\".\n\
         - State the key facts (who, what, where, when); no legal analysis.\n\
         - End with the source on its own line.\n\
         - Output only the summary and the source.\n\
         {GREEK_ONLY}\n\n\
         Original text:\n{}\n\nSource:\n{}",
        req.raw_text.trim(),
        req.source.trim()
    )
}

/// JSON schema constraining analysis output.
pub fn analysis_schema() -> Value {
    let article = json!({
        "type": "OBJECT",
        "properties": {
            "article": { "type": "STRING", "description": "Name, number or title of the article or law." },
            "reasoning": { "type": "STRING", "description": "Markdown explanation of how the article applies to the facts." },
            "link": { "type": "STRING", "description": "Google search URL whose query is the article itself." }
        },
        "required": ["article", "reasoning"]
    });
    json!({
        "type": "OBJECT",
        "properties": {
            "caseSummary": { "type": "STRING", "description": "Markdown summary and analysis of the case." },
            "plaintiffArticles": { "type": "ARRAY", "items": article.clone() },
            "defendantArticles": { "type": "ARRAY", "items": article }
        },
        "required": ["caseSummary", "plaintiffArticles", "defendantArticles"]
    })
}
