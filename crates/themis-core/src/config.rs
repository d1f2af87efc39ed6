use std::collections::HashMap;

use anyhow::{bail, Result};

/// Server configuration.
/// Values come from the process environment first, then a local `.env` file.
#[derive(Debug, Clone)]
pub struct Config {
    // Provider
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub provider_timeout_s: u64,
    pub analysis_temperature: f32,
    pub format_temperature: f32,
    /// Attach Google Search grounding to law search and chat requests.
    pub search_grounding: bool,

    // Dispatcher
    /// HTTP status used for in-band provider errors (the envelope carries the message).
    pub provider_error_status: u16,

    // Web
    pub web_bind: String,
    pub web_port: u16,
    pub static_dir: String,
}

fn parse_dotenv() -> HashMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return HashMap::new();
    };
    parse_dotenv_str(&contents)
}

fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, vars: &HashMap<String, String>) -> Option<String> {
    vars.get(key).filter(|v| !v.is_empty()).cloned()
}

fn get_str(key: &str, vars: &HashMap<String, String>, default: &str) -> String {
    get(key, vars).unwrap_or_else(|| default.to_string())
}

fn get_bool(key: &str, vars: &HashMap<String, String>, default: bool) -> bool {
    match get(key, vars).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => default,
        None => default,
    }
}

fn get_parsed<T: std::str::FromStr>(key: &str, vars: &HashMap<String, String>, default: T) -> T {
    get(key, vars)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut vars = parse_dotenv();
        vars.extend(std::env::vars());
        Self::from_vars(&vars)
    }

    /// Build from an explicit key/value map (env merged over `.env`).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let gemini_api_key = get("GEMINI_API_KEY", vars)
            .or_else(|| get("API_KEY", vars))
            .unwrap_or_default();
        if gemini_api_key.is_empty() {
            bail!("GEMINI_API_KEY environment variable is not set");
        }

        let provider_error_status = get_parsed("PROVIDER_ERROR_STATUS", vars, 200u16);
        if !(200..600).contains(&provider_error_status) {
            bail!("PROVIDER_ERROR_STATUS must be an HTTP status code, got {provider_error_status}");
        }

        Ok(Config {
            gemini_api_key,
            gemini_model: get_str("GEMINI_MODEL", vars, "gemini-2.5-flash"),
            gemini_base_url: get_str(
                "GEMINI_BASE_URL",
                vars,
                "https://generativelanguage.googleapis.com",
            ),
            provider_timeout_s: get_parsed("PROVIDER_TIMEOUT_S", vars, 120),
            analysis_temperature: get_parsed("ANALYSIS_TEMPERATURE", vars, 0.5),
            format_temperature: get_parsed("FORMAT_TEMPERATURE", vars, 0.2),
            search_grounding: get_bool("SEARCH_GROUNDING", vars, true),
            provider_error_status,
            web_bind: get_str("WEB_BIND", vars, "0.0.0.0"),
            web_port: get_parsed("WEB_PORT", vars, 3000),
            static_dir: get_str("STATIC_DIR", vars, "public"),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.web_bind, self.web_port)
    }
}
