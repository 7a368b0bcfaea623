//! Feature pipelines.
//!
//! Every pipeline is a fixed sequence of fallible stages. The first failing stage
//! ends the run and its error is returned unchanged; later stages never run.
//! Video pipelines run inside a temporary workspace that is removed afterwards.

pub mod extract;
pub mod recipe;
pub mod summary;

pub use extract::{ExtractType, VideoExtractOptions, VideoExtractResult};
pub use recipe::{RecipeFromHtmlOptions, RecipeFromVideoOptions, RecipeResult};
pub use summary::{SummaryFromHtmlOptions, SummaryFromVideoOptions, SummaryResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{create_archive, plan_entries, ArchiveConfig, ArchiveSources};
use crate::config::Config;
use crate::extractors::whisper::WhisperModel;
use crate::extractors::{
    CookieConfig, DownloadOptions, Downloader, TimeRange, TranscribeOptions, Transcriber, VideoArtifact,
    VideoMetadata, WebpageFetcher, WebpageResult, WebpageSource, WhisperTranscriber, YtDlpDownloader,
};
use crate::llm::{default_policy, GeminiProvider, ModelClient};
use crate::result::WithError;
use crate::utils::{is_valid_language_code, language_name, normalize_language};
use crate::workspace::DEFAULT_PREFIX;
use crate::InsightError;

/// The collaborators every pipeline runs against
pub struct InsightPipeline {
    downloader: Arc<dyn Downloader>,
    transcriber: Arc<dyn Transcriber>,
    webpage: Arc<dyn WebpageSource>,
    model: ModelClient,
    workspace_prefix: String,
    transcription_defaults: TranscribeOptions,
}

impl InsightPipeline {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        transcriber: Arc<dyn Transcriber>,
        webpage: Arc<dyn WebpageSource>,
        model: ModelClient,
    ) -> Self {
        Self {
            downloader,
            transcriber,
            webpage,
            model,
            workspace_prefix: DEFAULT_PREFIX.to_string(),
            transcription_defaults: TranscribeOptions {
                model: Some(WhisperModel::Turbo),
                verbose: Some(false),
                ..Default::default()
            },
        }
    }

    /// Production wiring: yt-dlp, whisper, the HTTP fetcher and Gemini.
    pub fn from_config(config: &Config, api_key: String) -> WithError<Self> {
        let whisper_model: WhisperModel = config
            .transcription
            .model
            .parse()
            .map_err(InsightError::Config)?;

        let provider = GeminiProvider::with_settings(
            api_key,
            &config.llm.base_url,
            Duration::from_secs(config.llm.request_timeout_secs),
        );
        let model = ModelClient::new(Arc::new(provider)).with_policy(default_policy(
            config.llm.max_retries,
            Duration::from_millis(config.llm.initial_delay_ms),
        ));

        Ok(Self::new(
            Arc::new(YtDlpDownloader::new()),
            Arc::new(WhisperTranscriber::new()),
            Arc::new(WebpageFetcher::default()),
            model,
        )
        .with_workspace_prefix(&config.app.temp_prefix)
        .with_transcription_defaults(TranscribeOptions {
            model: Some(whisper_model),
            device: config.transcription.device,
            verbose: Some(false),
            ..Default::default()
        }))
    }

    pub fn with_workspace_prefix(mut self, prefix: &str) -> Self {
        self.workspace_prefix = prefix.to_string();
        self
    }

    pub fn with_transcription_defaults(mut self, options: TranscribeOptions) -> Self {
        self.transcription_defaults = options;
        self
    }

    fn workspace_prefix(&self) -> Option<&str> {
        Some(self.workspace_prefix.as_str())
    }

    async fn download(
        &self,
        dir: &Path,
        url: &str,
        cookies: Option<&CookieConfig>,
        time_range: Option<TimeRange>,
    ) -> WithError<VideoArtifact> {
        let options = DownloadOptions {
            cookies: cookies.cloned(),
            time_range,
            ..Default::default()
        };

        self.downloader
            .download(url, dir, &options)
            .await
            .map_err(|e| InsightError::Download(e.to_string()))
    }

    async fn transcribe(&self, artifact: &VideoArtifact, dir: &Path, language: Option<&str>) -> WithError<String> {
        let mut options = self.transcription_defaults.clone();
        if let Some(code) = language {
            options.language = Some(code.to_string());
        }

        self.transcriber
            .transcribe(&artifact.media_path, dir, &options)
            .await
            .map_err(|e| InsightError::Transcription(e.to_string()))
    }

    /// Sidecar metadata. A missing sidecar yields empty metadata; a malformed one is an error.
    async fn load_metadata(&self, artifact: &VideoArtifact) -> WithError<VideoMetadata> {
        if !artifact.metadata_path.exists() {
            tracing::warn!(path = %artifact.metadata_path.display(), "No metadata sidecar, continuing without description");
            return Ok(VideoMetadata::default());
        }
        VideoMetadata::load(&artifact.metadata_path).await
    }

    async fn fetch_article(&self, url: &str) -> WithError<WebpageResult> {
        self.webpage
            .fetch_article(url)
            .await
            .map_err(|e| InsightError::Webpage(e.to_string()))
    }

    async fn package(&self, config: &ArchiveConfig, sources: ArchiveSources<'_>) -> WithError<PathBuf> {
        let entries = plan_entries(config, &sources);
        create_archive(&config.output_path, entries).await
    }
}

/// Resolve an output language given as a code or a name to its English name
pub(crate) fn resolve_output_language(language: &str) -> WithError<&'static str> {
    normalize_language(language)
        .ok_or_else(|| InsightError::Validation(format!("Unsupported output language: {}", language)))
}

/// Validate a spoken-language code and return its English name
pub(crate) fn resolve_video_language(code: Option<&str>) -> WithError<Option<&'static str>> {
    match code {
        None => Ok(None),
        Some(code) if is_valid_language_code(code) => Ok(language_name(code)),
        Some(code) => Err(InsightError::Validation(format!(
            "Unsupported video language code: {}",
            code
        ))),
    }
}
