use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{CookieConfig, Downloader, TimeRange, ToolError, VideoArtifact};
use crate::result::WithError;

const MEDIA_STEM: &str = "video";
const INFO_JSON_SUFFIX: &str = ".info.json";

/// Knobs passed through to yt-dlp for a single download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// yt-dlp `-f` format selector
    pub format: String,
    /// Container to merge separate video/audio streams into
    pub merge_output_format: Option<String>,
    pub quiet: bool,
    /// Write the `<stem>.info.json` metadata sidecar
    pub write_metadata: bool,
    pub cookies: Option<CookieConfig>,
    pub time_range: Option<TimeRange>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: "bestvideo*+bestaudio/best".to_string(),
            merge_output_format: Some("mp4".to_string()),
            quiet: true,
            write_metadata: true,
            cookies: None,
            time_range: None,
        }
    }
}

/// Build the yt-dlp argument list; the URL is always last.
pub fn build_download_args(url: &str, output_template: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = vec!["-f".to_string(), options.format.clone()];

    if let Some(merge) = &options.merge_output_format {
        args.push("--merge-output-format".to_string());
        args.push(merge.clone());
    }

    args.push("--restrict-filenames".to_string());
    args.push("--no-playlist".to_string());

    if options.quiet {
        args.push("--quiet".to_string());
    }
    if options.write_metadata {
        args.push("--write-info-json".to_string());
    }
    if let Some(cookies) = &options.cookies {
        args.extend(cookies.to_args());
    }
    if let Some(range) = &options.time_range {
        args.push("--download-sections".to_string());
        args.push(range.to_download_section());
    }

    args.push("-o".to_string());
    args.push(output_template.to_string());
    args.push(url.to_string());
    args
}

/// Video downloader backed by the yt-dlp executable
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: path.into(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        options: &DownloadOptions,
    ) -> WithError<VideoArtifact, ToolError> {
        let template = output_dir.join(format!("{}.%(ext)s", MEDIA_STEM));
        let args = build_download_args(url, &template.to_string_lossy(), options);

        tracing::debug!(url, dir = %output_dir.display(), "Running yt-dlp");

        let output = Command::new(&self.yt_dlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ToolError::NotInstalled { tool: "yt-dlp" },
                _ => ToolError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: "yt-dlp",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let media_path = find_media_file(output_dir).await?;
        let metadata_path = output_dir.join(format!("{}{}", MEDIA_STEM, INFO_JSON_SUFFIX));

        if options.write_metadata && !metadata_path.exists() {
            return Err(ToolError::Output(format!(
                "yt-dlp did not write {}",
                metadata_path.display()
            )));
        }

        tracing::info!(path = %media_path.display(), "Download complete");
        Ok(VideoArtifact {
            media_path,
            metadata_path,
        })
    }
}

/// Locate the downloaded media file. yt-dlp picks the extension, so scan the
/// directory for `video.<ext>` while skipping sidecars and partial downloads.
pub(crate) async fn find_media_file(dir: &Path) -> WithError<PathBuf, ToolError> {
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.ends_with(INFO_JSON_SUFFIX) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }

        let stem_matches = path.file_stem().and_then(|s| s.to_str()) == Some(MEDIA_STEM);
        if stem_matches && path.is_file() {
            return Ok(path);
        }
    }

    Err(ToolError::Output(format!(
        "no media file found in {}",
        dir.display()
    )))
}
