//! Reading the yt-dlp `.info.json` sidecar.
//!
//! Two views are offered. [`extract_metadata`] is strict: the caller names the
//! platform and the exact fields it needs, and gets back a map holding only those
//! fields (or an error if one is missing). [`VideoMetadata`] is lenient and is what
//! the pipelines use to pull the description into prompts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::result::WithError;
use crate::InsightError;

macro_rules! metadata_fields {
    ($name:ident { $($variant:ident => $key:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $key)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InsightError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|field| field.as_str() == s.trim())
                    .ok_or_else(|| InsightError::Validation(format!("unknown metadata field '{}'", s)))
            }
        }
    };
}

metadata_fields!(YoutubeField {
    Title => "title",
    Description => "description",
    Channel => "channel",
    Uploader => "uploader",
    UploadDate => "upload_date",
    Timestamp => "timestamp",
    Duration => "duration",
    DurationString => "duration_string",
    Tags => "tags",
    Categories => "categories",
    Chapters => "chapters",
    Language => "language",
    Location => "location",
    ViewCount => "view_count",
    LikeCount => "like_count",
    CommentCount => "comment_count",
    WebpageUrl => "webpage_url",
    Extractor => "extractor",
    ExtractorKey => "extractor_key",
    IsLive => "is_live",
    WasLive => "was_live",
    AgeLimit => "age_limit",
    Series => "series",
    Episode => "episode",
    Thumbnail => "thumbnail",
    Subtitles => "subtitles",
    AutomaticCaptions => "automatic_captions",
});

metadata_fields!(InstagramField {
    Description => "description",
    Channel => "channel",
    Uploader => "uploader",
    Duration => "duration",
    Timestamp => "timestamp",
    UploadDate => "upload_date",
    LikeCount => "like_count",
    CommentCount => "comment_count",
    Comments => "comments",
    Extractor => "extractor",
    ExtractorKey => "extractor_key",
});

/// Platform plus the exact fields the caller wants back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRequest {
    Youtube(Vec<YoutubeField>),
    Instagram(Vec<InstagramField>),
}

impl MetadataRequest {
    /// Build a request for `platform` ("youtube" or "instagram") from raw field names
    pub fn parse(platform: &str, fields: &[String]) -> WithError<Self> {
        match platform.trim().to_lowercase().as_str() {
            "youtube" => Ok(MetadataRequest::Youtube(
                fields.iter().map(|f| f.parse()).collect::<WithError<_>>()?,
            )),
            "instagram" => Ok(MetadataRequest::Instagram(
                fields.iter().map(|f| f.parse()).collect::<WithError<_>>()?,
            )),
            other => Err(InsightError::Validation(format!(
                "unsupported metadata platform '{}'",
                other
            ))),
        }
    }

    fn extractor_key(&self) -> &'static str {
        match self {
            MetadataRequest::Youtube(_) => "Youtube",
            MetadataRequest::Instagram(_) => "Instagram",
        }
    }

    fn keys(&self) -> Vec<&'static str> {
        match self {
            MetadataRequest::Youtube(fields) => fields.iter().map(|f| f.as_str()).collect(),
            MetadataRequest::Instagram(fields) => fields.iter().map(|f| f.as_str()).collect(),
        }
    }
}

/// Metadata restricted to the requested field names
pub type MetadataMap = BTreeMap<String, Value>;

/// Read `path` and return exactly the fields named by `request`.
pub async fn extract_metadata(path: &Path, request: &MetadataRequest) -> WithError<MetadataMap> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| InsightError::Metadata(format!("could not read {}: {}", path.display(), e)))?;

    let json: Value = serde_json::from_str(&raw)
        .map_err(|e| InsightError::Metadata(format!("invalid metadata JSON: {}", e)))?;

    select_fields(&json, request)
}

pub fn select_fields(json: &Value, request: &MetadataRequest) -> WithError<MetadataMap> {
    let object: &Map<String, Value> = json
        .as_object()
        .ok_or_else(|| InsightError::Metadata("metadata is not a JSON object".to_string()))?;

    let expected = request.extractor_key();
    match object.get("extractor_key").and_then(Value::as_str) {
        Some(key) if key == expected => {}
        Some(key) => {
            return Err(InsightError::Metadata(format!(
                "expected {} metadata, got {}",
                expected, key
            )))
        }
        None => {
            return Err(InsightError::Metadata(
                "metadata has no extractor_key".to_string(),
            ))
        }
    }

    request
        .keys()
        .into_iter()
        .map(|key| match object.get(key) {
            Some(value) if !value.is_null() => Ok((key.to_string(), value.clone())),
            _ => Err(InsightError::Metadata(format!(
                "required field '{}' is missing",
                key
            ))),
        })
        .collect()
}

/// Loose view of the sidecar; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
    pub extractor_key: Option<String>,
}

impl VideoMetadata {
    pub async fn load(path: &Path) -> WithError<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| InsightError::Metadata(format!("could not read {}: {}", path.display(), e)))?;

        serde_json::from_str(&raw).map_err(|e| InsightError::Metadata(format!("invalid metadata JSON: {}", e)))
    }
}
