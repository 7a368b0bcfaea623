use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::WebpageSource;
use crate::result::{flat_map_result, WithError};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Elements whose text never counts as readable content
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe"];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WebpageError {
    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    #[error("Expected HTML content, got: {0}")]
    UnexpectedContentType(String),

    #[error("{0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Extraction(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebpageMetadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,
}

/// Readable article pulled out of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebpageResult {
    /// HTML of the main content node
    pub content: String,
    /// Visible text of the main content node
    pub text_content: String,
    pub metadata: WebpageMetadata,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    /// Extra headers sent after the browser defaults
    pub headers: Vec<(String, String)>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            headers: Vec::new(),
        }
    }
}

/// HTTP fetcher that presents itself as a desktop browser
#[derive(Debug, Clone, Default)]
pub struct WebpageFetcher {
    settings: FetchSettings,
}

impl WebpageFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    /// GET `url` and return the body if it is a successful HTML response
    pub async fn fetch_html(&self, url: &str) -> WithError<String, WebpageError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| WebpageError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| WebpageError::Network(e.to_string()))?;

        let mut request = client
            .get(parsed)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, BROWSER_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1");
        for (name, value) in &self.settings.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(url, "Fetching webpage");
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebpageError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("text/html") {
            return Err(WebpageError::UnexpectedContentType(content_type));
        }

        response.text().await.map_err(map_reqwest_error)
    }
}

#[async_trait]
impl WebpageSource for WebpageFetcher {
    async fn fetch_article(&self, url: &str) -> WithError<WebpageResult, WebpageError> {
        flat_map_result(self.fetch_html(url).await, |html| extract_article(&html, url))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> WebpageError {
    if err.is_timeout() {
        return WebpageError::Timeout;
    }
    WebpageError::Network(err.to_string())
}

/// Readability-like extraction:
/// - content from `<article>`, else `<main>`, else `<body>`
/// - title from OpenGraph, `<title>` or the first `<h1>`
/// - byline, excerpt, site name and publish time from meta tags
pub fn extract_article(html: &str, url: &str) -> WithError<WebpageResult, WebpageError> {
    let doc = Html::parse_document(html);

    let root = ["article", "main", "body"]
        .iter()
        .find_map(|css| select_first(&doc, css))
        .ok_or_else(|| WebpageError::Extraction("Failed to extract article content from the webpage".to_string()))?;

    let text_content = visible_text(root);
    if text_content.is_empty() {
        return Err(WebpageError::Extraction(
            "Failed to extract article content from the webpage".to_string(),
        ));
    }

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| element_text(&doc, "title"))
        .or_else(|| element_text(&doc, "h1"));

    let excerpt = meta_content(&doc, r#"meta[name="description"]"#)
        .or_else(|| meta_content(&doc, r#"meta[property="og:description"]"#))
        .or_else(|| first_paragraph(root));

    let metadata = WebpageMetadata {
        title,
        byline: meta_content(&doc, r#"meta[name="author"]"#)
            .or_else(|| element_text(&doc, r#"[rel="author"]"#)),
        excerpt,
        site_name: meta_content(&doc, r#"meta[property="og:site_name"]"#),
        published_time: meta_content(&doc, r#"meta[property="article:published_time"]"#)
            .or_else(|| select_first(&doc, "time[datetime]").and_then(|t| t.value().attr("datetime").map(str::to_string))),
    };

    Ok(WebpageResult {
        content: root.inner_html(),
        text_content,
        metadata,
        url: url.to_string(),
    })
}

fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    select_first(doc, css)
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn element_text(doc: &Html, css: &str) -> Option<String> {
    select_first(doc, css)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn first_paragraph(root: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("p").ok()?;
    root.select(&selector)
        .map(visible_text)
        .find(|text| !text.is_empty())
}

/// Text nodes under `root`, skipping anything inside a hidden element
fn visible_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();

    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }

        let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    lines.join("\n")
}
