//! Turning raw model text into a typed response, and enriching it with provenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::result::WithError;
use crate::InsightError;

const FENCE: &str = "```";

/// Output format requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
        }
    }

    /// File extension used for saved results and archive members
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "txt",
        }
    }

    /// Language tags a fenced answer in this format may carry
    fn fence_tags(&self) -> &'static [&'static str] {
        match self {
            OutputFormat::Json => &["json"],
            OutputFormat::Markdown => &["markdown", "md"],
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed model output. JSON output is always an object.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Json(Map<String, Value>),
    Markdown(String),
}

impl ModelResponse {
    pub fn format(&self) -> OutputFormat {
        match self {
            ModelResponse::Json(_) => OutputFormat::Json,
            ModelResponse::Markdown(_) => OutputFormat::Markdown,
        }
    }

    /// Text written to files, archives and stdout
    pub fn render(&self) -> String {
        match self {
            ModelResponse::Json(map) => serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string()),
            ModelResponse::Markdown(text) => text.clone(),
        }
    }

    pub fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            ModelResponse::Json(map) => Some(map),
            ModelResponse::Markdown(_) => None,
        }
    }

    pub fn as_markdown(&self) -> Option<&str> {
        match self {
            ModelResponse::Markdown(text) => Some(text),
            ModelResponse::Json(_) => None,
        }
    }
}

impl Serialize for ModelResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModelResponse::Json(map) => map.serialize(serializer),
            ModelResponse::Markdown(text) => text.serialize(serializer),
        }
    }
}

/// Remove the code fence models like to wrap their answer in.
///
/// Only a fence that is bare or tagged with `format` is removed, together with its
/// closing fence. Any other text, including an answer that merely ends with a code
/// block, is returned trimmed. Applying it twice to clean text gives the same result.
pub fn strip_formatting_artifacts(text: &str, format: OutputFormat) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix(FENCE) else {
        return trimmed.to_string();
    };

    let body = match rest.split_once('\n') {
        Some((tag, body)) if fence_tag_matches(tag, format) => body,
        Some(_) => return trimmed.to_string(),
        None => format
            .fence_tags()
            .iter()
            .find_map(|tag| rest.strip_prefix(tag))
            .unwrap_or(rest),
    };

    let body = body.trim_end();
    body.strip_suffix(FENCE).unwrap_or(body).trim().to_string()
}

fn fence_tag_matches(tag: &str, format: OutputFormat) -> bool {
    let tag = tag.trim();
    tag.is_empty() || format.fence_tags().iter().any(|known| tag.eq_ignore_ascii_case(known))
}

/// Clean the raw text and parse it according to `format`.
pub fn deserialize_response(raw: &str, format: OutputFormat) -> WithError<ModelResponse> {
    let cleaned = strip_formatting_artifacts(raw, format);

    match format {
        OutputFormat::Markdown => Ok(ModelResponse::Markdown(cleaned)),
        OutputFormat::Json => match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Object(map)) => Ok(ModelResponse::Json(map)),
            Ok(_) => Err(InsightError::Parse("expected a JSON object".to_string())),
            Err(e) => Err(InsightError::Parse(e.to_string())),
        },
    }
}

/// Copy of `response` carrying the source URL: a `source_url` key for JSON, a
/// trailing `Source Url:` line for markdown.
pub fn enrich_with_source_url(response: &ModelResponse, url: &str) -> ModelResponse {
    match response {
        ModelResponse::Json(map) => {
            let mut map = map.clone();
            map.insert("source_url".to_string(), Value::String(url.to_string()));
            ModelResponse::Json(map)
        }
        ModelResponse::Markdown(text) => ModelResponse::Markdown(format!("{}\n\nSource Url: {}", text, url)),
    }
}

/// Copy of `response` with `original_language` set. Markdown is returned unchanged.
pub fn enrich_with_language(response: &ModelResponse, language: &str) -> ModelResponse {
    match response {
        ModelResponse::Json(map) => {
            let mut map = map.clone();
            map.insert("original_language".to_string(), Value::String(language.to_string()));
            ModelResponse::Json(map)
        }
        ModelResponse::Markdown(_) => response.clone(),
    }
}
