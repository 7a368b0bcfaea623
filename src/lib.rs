//! Video Insights - turn cooking videos and webpages into structured recipes and notes
//!
//! This library chains external tools (yt-dlp, Whisper), an HTML readability extractor
//! and a Gemini model call into short, fallible pipelines. Every stage reports failure
//! through [`WithError`] instead of panicking, and the model call is retried with a
//! bounded, pluggable policy.

pub mod archive;
pub mod bulk;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod result;
pub mod retry;
pub mod utils;
pub mod workspace;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{CookieConfig, TimeRange, VideoArtifact};
pub use pipeline::InsightPipeline;
pub use response::{ModelResponse, OutputFormat};
pub use result::WithError;
pub use retry::RetryPolicy;

/// Result type used by the application layer (CLI, config, bulk driver)
pub type Result<T> = anyhow::Result<T>;

/// Error types reported by the pipelines and their stages
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InsightError {
    #[error("Failed to download video: {0}")]
    Download(String),

    #[error("Failed to process video: {0}")]
    Transcription(String),

    #[error("Failed to read video metadata: {0}")]
    Metadata(String),

    #[error("Failed to fetch webpage: {0}")]
    Webpage(String),

    #[error("Model API error: {0}")]
    Model(String),

    #[error("Failed to parse JSON response: {0}")]
    Parse(String),

    #[error("Archive creation failed: {0}")]
    Archive(String),

    #[error("Temporary workspace error: {0}")]
    Workspace(String),

    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
