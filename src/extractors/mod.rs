use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

pub mod metadata;
pub mod webpage;
pub mod whisper;
pub mod ytdlp;

pub use metadata::{extract_metadata, MetadataRequest, VideoMetadata};
pub use webpage::{WebpageError, WebpageFetcher, WebpageResult};
pub use whisper::{TranscribeOptions, WhisperTranscriber};
pub use ytdlp::{DownloadOptions, YtDlpDownloader};

use crate::result::WithError;
use crate::InsightError;

/// Faults raised while running an external command-line tool
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("{tool} is not installed or not on PATH")]
    NotInstalled { tool: &'static str },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Output(String),
}

/// Files produced by the downloader inside a temporary workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub media_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Browsers yt-dlp can read cookies from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Brave,
    Chrome,
    Chromium,
    Edge,
    Firefox,
    Opera,
    Safari,
    Vivaldi,
    Whale,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Brave => "brave",
            Browser::Chrome => "chrome",
            Browser::Chromium => "chromium",
            Browser::Edge => "edge",
            Browser::Firefox => "firefox",
            Browser::Opera => "opera",
            Browser::Safari => "safari",
            Browser::Vivaldi => "vivaldi",
            Browser::Whale => "whale",
        }
    }
}

/// Keyrings used to decrypt Chromium cookies on Linux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Keyring {
    Basictext,
    Gnomekeyring,
    Kwallet,
    Kwallet5,
    Kwallet6,
}

impl Keyring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyring::Basictext => "basictext",
            Keyring::Gnomekeyring => "gnomekeyring",
            Keyring::Kwallet => "kwallet",
            Keyring::Kwallet5 => "kwallet5",
            Keyring::Kwallet6 => "kwallet6",
        }
    }
}

/// Where the downloader should take authentication cookies from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CookieConfig {
    /// Netscape-format cookie file
    File { path: PathBuf },
    /// Browser profile, optionally with a keyring
    Browser {
        browser: Browser,
        profile: Option<String>,
        keyring: Option<Keyring>,
    },
}

impl CookieConfig {
    /// Build a cookie configuration from the loose CLI/config fields.
    ///
    /// A cookie file and a browser source are mutually exclusive, and a profile or
    /// keyring only make sense together with a browser.
    pub fn from_parts(
        cookies_file: Option<PathBuf>,
        browser: Option<Browser>,
        profile: Option<String>,
        keyring: Option<Keyring>,
    ) -> WithError<Option<Self>> {
        match (cookies_file, browser) {
            (Some(_), Some(_)) => Err(InsightError::Validation(
                "--cookies-file cannot be combined with --cookies-from-browser".to_string(),
            )),
            (Some(_), None) if profile.is_some() || keyring.is_some() => Err(InsightError::Validation(
                "--browser-profile and --keyring require --cookies-from-browser".to_string(),
            )),
            (Some(path), None) => Ok(Some(CookieConfig::File { path })),
            (None, Some(browser)) => Ok(Some(CookieConfig::Browser {
                browser,
                profile,
                keyring,
            })),
            (None, None) if profile.is_some() || keyring.is_some() => Err(InsightError::Validation(
                "--browser-profile and --keyring require --cookies-from-browser".to_string(),
            )),
            (None, None) => Ok(None),
        }
    }

    /// yt-dlp arguments selecting this cookie source
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CookieConfig::File { path } => {
                vec!["--cookies".to_string(), path.to_string_lossy().into_owned()]
            }
            CookieConfig::Browser {
                browser,
                profile,
                keyring,
            } => {
                let mut source = browser.as_str().to_string();
                if let Some(keyring) = keyring {
                    source.push('+');
                    source.push_str(keyring.as_str());
                }
                if let Some(profile) = profile {
                    source.push(':');
                    source.push_str(profile);
                }
                vec!["--cookies-from-browser".to_string(), source]
            }
        }
    }
}

/// Optional start/end bounds in seconds. A missing bound means "from the beginning"
/// or "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

const TIME_RANGE_FORMAT: &str = "Invalid time range format. Expected 'START:END', ':END', or 'START:'";

/// Parse `START:END`, `:END` or `START:` (seconds, non-negative, start < end)
pub fn parse_time_range(input: &str) -> WithError<TimeRange> {
    let trimmed = input.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();

    if parts.len() != 2 {
        return Err(InsightError::Validation(TIME_RANGE_FORMAT.to_string()));
    }

    let start = parse_bound(parts[0], "start")?;
    let end = parse_bound(parts[1], "end")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(InsightError::Validation(format!(
                "Start time ({}) must be less than end time ({}).",
                start, end
            )));
        }
    }

    Ok(TimeRange { start, end })
}

fn parse_bound(raw: &str, label: &str) -> WithError<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(InsightError::Validation(format!(
            "Invalid {} time: \"{}\". Must be a non-negative number.",
            label, raw
        ))),
    }
}

impl FromStr for TimeRange {
    type Err = InsightError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_time_range(s)
    }
}

impl TimeRange {
    /// yt-dlp `--download-sections` value
    pub fn to_download_section(&self) -> String {
        let start = self.start.unwrap_or(0.0);
        match self.end {
            Some(end) => format!("*{}-{}", start, end),
            None => format!("*{}-inf", start),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "{}s-{}s", s, e),
            (Some(s), None) => write!(f, "{}s-end", s),
            (None, Some(e)) => write!(f, "start-{}s", e),
            (None, None) => write!(f, "full"),
        }
    }
}

/// Downloads a video and its metadata sidecar into a directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> WithError<VideoArtifact, ToolError>;
}

/// Turns a media file into plain-text speech
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        media_path: &Path,
        output_dir: &Path,
        options: &TranscribeOptions,
    ) -> WithError<String, ToolError>;
}

/// Fetches a webpage and extracts its readable article
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebpageSource: Send + Sync {
    async fn fetch_article(&self, url: &str) -> WithError<WebpageResult, WebpageError>;
}

/// Validate that the input is an http(s) URL
pub fn validate_url(url: &str) -> WithError<Url> {
    let parsed =
        Url::parse(url).map_err(|_| InsightError::Validation(format!("Invalid URL format: {}", url)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InsightError::Validation(
            "URL must use HTTP or HTTPS protocol".to_string(),
        ));
    }

    Ok(parsed)
}
