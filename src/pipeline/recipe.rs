//! Structured recipe extraction from a video or a recipe webpage.

use serde::Serialize;
use std::path::PathBuf;

use super::{resolve_output_language, resolve_video_language, InsightPipeline};
use crate::archive::{ArchiveConfig, ArchiveSources, ResultArtifact};
use crate::extractors::{validate_url, CookieConfig, TimeRange};
use crate::prompts::{create_recipe_prompt, PromptData, RecipePrompt};
use crate::response::{deserialize_response, enrich_with_language, enrich_with_source_url, ModelResponse, OutputFormat};
use crate::result::{flat_map_result, flat_map_result_async, map_result, WithError};
use crate::workspace::with_temporary_workspace;
use crate::InsightError;

#[derive(Debug, Clone)]
pub struct RecipeFromVideoOptions {
    pub url: String,
    /// Spoken language of the video as an ISO 639-1 code
    pub video_language: Option<String>,
    /// Output language as a code or an English name
    pub output_language: String,
    pub schema: String,
    pub model: String,
    pub output_format: OutputFormat,
    pub cookies: Option<CookieConfig>,
    pub time_range: Option<TimeRange>,
    pub archive: Option<ArchiveConfig>,
}

#[derive(Debug, Clone)]
pub struct RecipeFromHtmlOptions {
    pub url: String,
    pub output_language: String,
    pub schema: String,
    pub model: String,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeResult {
    pub content: ModelResponse,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
}

impl InsightPipeline {
    /// download → transcribe → metadata → prompt → model → parse → enrich → archive
    pub async fn recipe_from_video(&self, options: &RecipeFromVideoOptions) -> WithError<RecipeResult> {
        validate_url(&options.url)?;
        let language = resolve_output_language(&options.output_language)?;
        let source_language = resolve_video_language(options.video_language.as_deref())?;

        tracing::info!(url = %options.url, language, format = %options.output_format, "Extracting recipe from video");

        with_temporary_workspace(self.workspace_prefix(), |dir| async move {
            let artifact = self
                .download(&dir, &options.url, options.cookies.as_ref(), options.time_range)
                .await?;
            let transcription = self
                .transcribe(&artifact, &dir, options.video_language.as_deref())
                .await?;
            let metadata = self.load_metadata(&artifact).await?;

            let data = PromptData::Video {
                description: metadata.description.unwrap_or_default(),
                transcribed_text: transcription.clone(),
            };
            let prompt = create_recipe_prompt(&RecipePrompt {
                data: &data,
                language,
                schema: &options.schema,
                format: options.output_format,
                filename: options.archive.as_ref().and_then(|a| a.filename.as_deref()),
            });

            let reply = self.model.call(&options.model, &prompt).await?;
            let parsed = deserialize_response(&reply.text, options.output_format)?;
            let with_url = enrich_with_source_url(&parsed, &options.url);
            let content = match source_language {
                Some(name) => enrich_with_language(&with_url, name),
                None => with_url,
            };

            let archive_path = match &options.archive {
                Some(config) => {
                    let rendered = content.render();
                    let sources = ArchiveSources {
                        video: Some(artifact.media_path.as_path()),
                        transcription: Some(transcription.as_str()),
                        metadata: Some(artifact.metadata_path.as_path()).filter(|p| p.exists()),
                        result: Some(ResultArtifact {
                            content: &rendered,
                            default_stem: "recipe",
                            extension: options.output_format.extension(),
                        }),
                    };
                    Some(self.package(config, sources).await?)
                }
                None => None,
            };

            Ok::<_, InsightError>(RecipeResult {
                content,
                source_url: options.url.clone(),
                archive_path,
            })
        })
        .await?
    }

    /// fetch → extract article → prompt → model → parse → enrich
    pub async fn recipe_from_html(&self, options: &RecipeFromHtmlOptions) -> WithError<RecipeResult> {
        validate_url(&options.url)?;
        let language = resolve_output_language(&options.output_language)?;

        tracing::info!(url = %options.url, language, format = %options.output_format, "Extracting recipe from webpage");

        let page = self.fetch_article(&options.url).await;

        let reply = flat_map_result_async(page, |page| async move {
            let data = PromptData::Webpage {
                webpage_content: page.text_content,
                article_title: page.metadata.title,
            };
            let prompt = create_recipe_prompt(&RecipePrompt {
                data: &data,
                language,
                schema: &options.schema,
                format: options.output_format,
                filename: None,
            });
            self.model.call(&options.model, &prompt).await
        })
        .await;

        let parsed = flat_map_result(reply, |reply| deserialize_response(&reply.text, options.output_format));

        map_result(parsed, |parsed| RecipeResult {
            content: enrich_with_source_url(&parsed, &options.url),
            source_url: options.url.clone(),
            archive_path: None,
        })
    }
}

impl RecipeResult {
    /// The title of a JSON recipe, if the model produced one
    pub fn title(&self) -> Option<&str> {
        self.content.as_json()?.get("title")?.as_str()
    }

    pub fn require_json(&self) -> WithError<&serde_json::Map<String, serde_json::Value>> {
        self.content
            .as_json()
            .ok_or_else(|| InsightError::Validation("expected a JSON recipe".to_string()))
    }
}
