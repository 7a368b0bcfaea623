//! Raw data extraction from a video: description, transcript and selected metadata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{resolve_video_language, InsightPipeline};
use crate::archive::{ArchiveConfig, ArchiveInclude, ArchiveSources};
use crate::extractors::metadata::MetadataMap;
use crate::extractors::{extract_metadata, validate_url, CookieConfig, MetadataRequest, TimeRange};
use crate::result::WithError;
use crate::workspace::with_temporary_workspace;
use crate::InsightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractType {
    Description,
    Transcription,
}

impl ExtractType {
    pub const DEFAULT: [ExtractType; 2] = [ExtractType::Description, ExtractType::Transcription];
}

#[derive(Debug, Clone)]
pub struct VideoExtractOptions {
    pub url: String,
    pub video_language: Option<String>,
    pub cookies: Option<CookieConfig>,
    pub time_range: Option<TimeRange>,
    /// `None` extracts both the description and the transcription
    pub extract_types: Option<Vec<ExtractType>>,
    pub metadata: Option<MetadataRequest>,
    pub archive: Option<ArchiveConfig>,
}

impl VideoExtractOptions {
    fn wants(&self, kind: ExtractType) -> bool {
        match &self.extract_types {
            Some(types) => types.contains(&kind),
            None => ExtractType::DEFAULT.contains(&kind),
        }
    }
}

/// Requested outputs; anything not requested stays `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoExtractResult {
    pub transcription: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataMap>,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
}

impl InsightPipeline {
    pub async fn extract_from_video(&self, options: &VideoExtractOptions) -> WithError<VideoExtractResult> {
        validate_url(&options.url)?;
        resolve_video_language(options.video_language.as_deref())?;

        let needs_transcription = options.wants(ExtractType::Transcription);
        tracing::info!(url = %options.url, needs_transcription, "Extracting video data");

        with_temporary_workspace(self.workspace_prefix(), |dir| async move {
            let artifact = self
                .download(&dir, &options.url, options.cookies.as_ref(), options.time_range)
                .await?;

            let transcription = if needs_transcription {
                Some(
                    self.transcribe(&artifact, &dir, options.video_language.as_deref())
                        .await?,
                )
            } else {
                None
            };

            let description = if options.wants(ExtractType::Description) {
                self.load_metadata(&artifact).await?.description
            } else {
                None
            };

            let metadata = match &options.metadata {
                Some(request) => Some(extract_metadata(&artifact.metadata_path, request).await?),
                None => None,
            };

            let archive_path = match &options.archive {
                Some(config) => {
                    // The result member has no meaning here; a summary or recipe is never produced.
                    let config = ArchiveConfig {
                        include: config
                            .include
                            .iter()
                            .copied()
                            .filter(|tag| *tag != ArchiveInclude::Result)
                            .collect(),
                        ..config.clone()
                    };
                    let sources = ArchiveSources {
                        video: Some(artifact.media_path.as_path()),
                        transcription: transcription.as_deref(),
                        metadata: Some(artifact.metadata_path.as_path()).filter(|p| p.exists()),
                        result: None,
                    };
                    Some(self.package(&config, sources).await?)
                }
                None => None,
            };

            Ok::<_, InsightError>(VideoExtractResult {
                transcription,
                description,
                metadata,
                source_url: options.url.clone(),
                archive_path,
            })
        })
        .await?
    }
}
