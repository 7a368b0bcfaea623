//! End-to-end pipeline runs against stub collaborators.

use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use video_insights::archive::{ArchiveConfig, ArchiveInclude};
use video_insights::extractors::{
    DownloadOptions, Downloader, ToolError, TranscribeOptions, Transcriber, VideoArtifact, WebpageError,
    WebpageResult, WebpageSource,
};
use video_insights::llm::{default_policy, FakeProvider, ModelClient};
use video_insights::pipeline::RecipeFromVideoOptions;
use video_insights::{InsightPipeline, OutputFormat};

/// Writes fixed files into the workspace and remembers where it was asked to put them
#[derive(Default)]
struct StubDownloader {
    workspaces: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Downloader for StubDownloader {
    async fn download(
        &self,
        _url: &str,
        output_dir: &Path,
        _options: &DownloadOptions,
    ) -> Result<VideoArtifact, ToolError> {
        self.workspaces.lock().unwrap().push(output_dir.to_path_buf());

        let media_path = output_dir.join("video.mp4");
        let metadata_path = output_dir.join("video.info.json");
        tokio::fs::write(&media_path, b"not really a video").await?;
        tokio::fs::write(&metadata_path, r#"{"title":"Pasta","description":"Quick pasta"}"#).await?;

        Ok(VideoArtifact {
            media_path,
            metadata_path,
        })
    }
}

struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        _media_path: &Path,
        _output_dir: &Path,
        _options: &TranscribeOptions,
    ) -> Result<String, ToolError> {
        Ok("hello world".to_string())
    }
}

struct NoWebpage;

#[async_trait]
impl WebpageSource for NoWebpage {
    async fn fetch_article(&self, _url: &str) -> Result<WebpageResult, WebpageError> {
        Err(WebpageError::Network("not used".to_string()))
    }
}

fn pipeline(downloader: Arc<StubDownloader>, reply: &str) -> InsightPipeline {
    let model = ModelClient::new(Arc::new(FakeProvider::with_reply(reply))).with_policy(default_policy(3, Duration::ZERO));
    InsightPipeline::new(downloader, Arc::new(StubTranscriber), Arc::new(NoWebpage), model)
}

fn options(url: &str, output_format: OutputFormat, archive: Option<ArchiveConfig>) -> RecipeFromVideoOptions {
    RecipeFromVideoOptions {
        url: url.to_string(),
        video_language: None,
        output_language: "English".to_string(),
        schema: "{}".to_string(),
        model: "gemini-flash-lite-latest".to_string(),
        output_format,
        cookies: None,
        time_range: None,
        archive,
    }
}

fn member_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[tokio::test]
async fn recipe_from_video_parses_fenced_json_and_adds_source_url() {
    let downloader = Arc::new(StubDownloader::default());
    let pipeline = pipeline(downloader.clone(), "```json\n{\"title\":\"T\"}\n```");
    let url = "https://www.youtube.com/watch?v=pasta";

    let result = pipeline
        .recipe_from_video(&options(url, OutputFormat::Json, None))
        .await
        .unwrap();

    let json = result.content.as_json().unwrap();
    assert_eq!(json["title"], "T");
    assert_eq!(json["source_url"], url);
    assert_eq!(result.source_url, url);

    let workspaces = downloader.workspaces.lock().unwrap();
    assert_eq!(workspaces.len(), 1);
    assert!(!workspaces[0].exists(), "temporary workspace should be removed");
}

#[tokio::test]
async fn archive_holds_only_requested_members_under_custom_name() {
    let out = tempfile::tempdir().unwrap();
    let archive_path = out.path().join("bundle.zip");
    let pipeline = pipeline(Arc::new(StubDownloader::default()), "{\"title\":\"Pasta\"}");

    let archive = ArchiveConfig {
        output_path: archive_path.clone(),
        include: vec![ArchiveInclude::Transcription, ArchiveInclude::Result],
        filename: Some("pasta".to_string()),
    };
    let result = pipeline
        .recipe_from_video(&options("https://www.youtube.com/watch?v=pasta", OutputFormat::Json, Some(archive)))
        .await
        .unwrap();

    assert_eq!(result.archive_path.as_deref(), Some(archive_path.as_path()));
    assert_eq!(member_names(&archive_path), vec!["pasta.json", "transcription.txt"]);

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let mut transcript = String::new();
    zip.by_name("transcription.txt")
        .unwrap()
        .read_to_string(&mut transcript)
        .unwrap();
    assert_eq!(transcript, "hello world");
}

#[tokio::test]
async fn markdown_archive_uses_txt_extension() {
    let out = tempfile::tempdir().unwrap();
    let archive_path = out.path().join("bundle.zip");
    let pipeline = pipeline(Arc::new(StubDownloader::default()), "# Pasta\n\n## Ingredients\n- pasta");

    let archive = ArchiveConfig {
        output_path: archive_path.clone(),
        include: vec![ArchiveInclude::Transcription, ArchiveInclude::Result],
        filename: Some("pasta".to_string()),
    };
    let result = pipeline
        .recipe_from_video(&options(
            "https://www.youtube.com/watch?v=pasta",
            OutputFormat::Markdown,
            Some(archive),
        ))
        .await
        .unwrap();

    assert!(result
        .content
        .as_markdown()
        .unwrap()
        .ends_with("Source Url: https://www.youtube.com/watch?v=pasta"));
    assert_eq!(member_names(&archive_path), vec!["pasta.txt", "transcription.txt"]);
}

#[tokio::test]
async fn parse_failure_leaves_no_workspace_behind() {
    let downloader = Arc::new(StubDownloader::default());
    let pipeline = pipeline(downloader.clone(), "this is not json");

    let err = pipeline
        .recipe_from_video(&options("https://www.youtube.com/watch?v=x", OutputFormat::Json, None))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to parse JSON response:"));
    let workspaces = downloader.workspaces.lock().unwrap();
    assert!(!workspaces[0].exists());
}
