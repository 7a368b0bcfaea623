//! Markdown note-style summaries of a video or a webpage.

use serde::Serialize;
use std::path::PathBuf;

use super::{resolve_output_language, InsightPipeline};
use crate::archive::{ArchiveConfig, ArchiveSources, ResultArtifact};
use crate::extractors::{validate_url, CookieConfig, TimeRange};
use crate::prompts::{create_summary_prompt, PromptData};
use crate::response::{deserialize_response, enrich_with_source_url, ModelResponse, OutputFormat};
use crate::result::{flat_map_result, flat_map_result_async, map_result, WithError};
use crate::workspace::with_temporary_workspace;
use crate::InsightError;

#[derive(Debug, Clone)]
pub struct SummaryFromVideoOptions {
    pub url: String,
    pub video_language: Option<String>,
    pub output_language: String,
    pub model: String,
    pub cookies: Option<CookieConfig>,
    pub time_range: Option<TimeRange>,
    /// Replaces the default notes template
    pub custom_prompt: Option<String>,
    pub archive: Option<ArchiveConfig>,
}

#[derive(Debug, Clone)]
pub struct SummaryFromHtmlOptions {
    pub url: String,
    pub output_language: String,
    pub model: String,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryResult {
    pub content: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
}

fn markdown_text(response: ModelResponse) -> String {
    match response {
        ModelResponse::Markdown(text) => text,
        other => other.render(),
    }
}

impl InsightPipeline {
    pub async fn summary_from_video(&self, options: &SummaryFromVideoOptions) -> WithError<SummaryResult> {
        validate_url(&options.url)?;
        let language = resolve_output_language(&options.output_language)?;
        super::resolve_video_language(options.video_language.as_deref())?;

        tracing::info!(url = %options.url, language, "Summarizing video");

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
            let prompt = create_summary_prompt(&data, language, options.custom_prompt.as_deref());

            let reply = self.model.call(&options.model, &prompt).await?;
            let parsed = deserialize_response(&reply.text, OutputFormat::Markdown)?;
            let content = markdown_text(enrich_with_source_url(&parsed, &options.url));

            let archive_path = match &options.archive {
                Some(config) => {
                    let sources = ArchiveSources {
                        video: Some(artifact.media_path.as_path()),
                        transcription: Some(transcription.as_str()),
                        metadata: Some(artifact.metadata_path.as_path()).filter(|p| p.exists()),
                        result: Some(ResultArtifact {
                            content: &content,
                            default_stem: "summary",
                            extension: OutputFormat::Markdown.extension(),
                        }),
                    };
                    Some(self.package(config, sources).await?)
                }
                None => None,
            };

            Ok::<_, InsightError>(SummaryResult {
                content,
                source_url: options.url.clone(),
                archive_path,
            })
        })
        .await?
    }

    pub async fn summary_from_html(&self, options: &SummaryFromHtmlOptions) -> WithError<SummaryResult> {
        validate_url(&options.url)?;
        let language = resolve_output_language(&options.output_language)?;

        tracing::info!(url = %options.url, language, "Summarizing webpage");

        let page = self.fetch_article(&options.url).await;

        let reply = flat_map_result_async(page, |page| async move {
            let data = PromptData::Webpage {
                webpage_content: page.text_content,
                article_title: page.metadata.title,
            };
            let prompt = create_summary_prompt(&data, language, options.custom_prompt.as_deref());
            self.model.call(&options.model, &prompt).await
        })
        .await;

        let parsed = flat_map_result(reply, |reply| deserialize_response(&reply.text, OutputFormat::Markdown));

        map_result(parsed, |parsed| SummaryResult {
            content: markdown_text(enrich_with_source_url(&parsed, &options.url)),
            source_url: options.url.clone(),
            archive_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveInclude;
    use crate::extractors::webpage::WebpageMetadata;
    use crate::extractors::{MockDownloader, MockTranscriber, MockWebpageSource, WebpageError, WebpageResult};
    use crate::llm::{FakeProvider, LlmError};
    use crate::pipeline::test_support::*;
    use std::sync::Arc;

    fn video_options() -> SummaryFromVideoOptions {
        SummaryFromVideoOptions {
            url: "https://example.com/talk".to_string(),
            video_language: None,
            output_language: "en".to_string(),
            model: "gemini-test".to_string(),
            cookies: None,
            time_range: None,
            custom_prompt: None,
            archive: None,
        }
    }

    #[tokio::test]
    async fn test_summary_from_video_appends_source() {
        let provider = Arc::new(FakeProvider::with_reply("```markdown\n# Talk\n## Overview\nShort.\n```"));
        let pipeline = pipeline(
            downloader_writing("conference talk"),
            transcriber_saying("welcome everyone"),
            unused_webpage(),
            provider.clone(),
        );

        let result = pipeline.summary_from_video(&video_options()).await.unwrap();

        assert_eq!(
            result.content,
            "# Talk\n## Overview\nShort.\n\nSource Url: https://example.com/talk"
        );
        assert!(provider.prompts()[0].contains("## Action Items"));
    }

    #[tokio::test]
    async fn test_custom_prompt_replaces_template() {
        let provider = Arc::new(FakeProvider::with_reply("- hammer"));
        let pipeline = pipeline(
            downloader_writing("d"),
            transcriber_saying("grab a hammer"),
            unused_webpage(),
            provider.clone(),
        );
        let mut options = video_options();
        options.custom_prompt = Some("List every tool used.".to_string());

        pipeline.summary_from_video(&options).await.unwrap();
        let prompt = &provider.prompts()[0];
        assert!(prompt.starts_with("List every tool used."));
        assert!(!prompt.contains("## Action Items"));
    }

    #[tokio::test]
    async fn test_summary_archive_default_names() {
        let out = tempfile::tempdir().unwrap();
        let archive_path = out.path().join("talk.zip");
        let pipeline = pipeline(
            downloader_writing("d"),
            transcriber_saying("t"),
            unused_webpage(),
            Arc::new(FakeProvider::with_reply("# Notes")),
        );
        let mut options = video_options();
        options.archive = Some(ArchiveConfig {
            output_path: archive_path.clone(),
            include: ArchiveInclude::ALL.to_vec(),
            filename: None,
        });

        pipeline.summary_from_video(&options).await.unwrap();

        let archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["metadata.json", "summary.txt", "transcription.txt", "video.mp4"]);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported_after_retries() {
        let provider = Arc::new(FakeProvider::scripted(vec![
            Err(LlmError::ApiError { status: 503, message: "overloaded".to_string() }),
            Err(LlmError::ApiError { status: 503, message: "overloaded".to_string() }),
            Err(LlmError::ApiError { status: 503, message: "overloaded".to_string() }),
            Err(LlmError::ApiError { status: 503, message: "overloaded".to_string() }),
        ]));
        let pipeline = pipeline(
            downloader_writing("d"),
            transcriber_saying("t"),
            unused_webpage(),
            provider.clone(),
        );

        let err = pipeline.summary_from_video(&video_options()).await.unwrap_err();
        assert!(err.to_string().starts_with("Model API error:"));
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_summary_from_html() {
        let mut webpage = MockWebpageSource::new();
        webpage.expect_fetch_article().returning(|url| {
            Ok(WebpageResult {
                content: "<p>Rust 2024</p>".to_string(),
                text_content: "Rust 2024 edition notes".to_string(),
                metadata: WebpageMetadata {
                    title: Some("Edition".to_string()),
                    ..Default::default()
                },
                url: url.to_string(),
            })
        });
        let provider = Arc::new(FakeProvider::with_reply("# Edition"));
        let pipeline = pipeline(MockDownloader::new(), MockTranscriber::new(), webpage, provider.clone());

        let result = pipeline
            .summary_from_html(&SummaryFromHtmlOptions {
                url: "https://blog.test/edition".to_string(),
                output_language: "German".to_string(),
                model: "gemini-test".to_string(),
                custom_prompt: None,
            })
            .await
            .unwrap();

        assert_eq!(result.content, "# Edition\n\nSource Url: https://blog.test/edition");
        assert!(provider.prompts()[0].contains("to German language"));
    }

    #[tokio::test]
    async fn test_summary_from_html_timeout() {
        let mut webpage = MockWebpageSource::new();
        webpage
            .expect_fetch_article()
            .returning(|_| Err(WebpageError::Timeout));
        let provider = Arc::new(FakeProvider::default());
        let pipeline = pipeline(MockDownloader::new(), MockTranscriber::new(), webpage, provider.clone());

        let err = pipeline
            .summary_from_html(&SummaryFromHtmlOptions {
                url: "https://slow.test/".to_string(),
                output_language: "en".to_string(),
                model: "gemini-test".to_string(),
                custom_prompt: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch webpage: Request timeout");
        assert_eq!(provider.call_count(), 0);
    }
}
