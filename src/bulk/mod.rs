//! Batch recipe extraction from a semicolon-separated list of videos.
//!
//! Each input line is `url;filename;video_lang;output_lang;range`; everything
//! after the URL is optional. Items run one after another with a pause between
//! them. A failing item is logged to `_errors.log` and does not stop the batch.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::{ArchiveConfig, ArchiveInclude};
use crate::extractors::{parse_time_range, TimeRange};
use crate::pipeline::{InsightPipeline, RecipeFromVideoOptions};
use crate::response::OutputFormat;
use crate::utils::{is_valid_language_code, normalize_language, slugify};

pub const ERROR_LOG: &str = "_errors.log";
const DEFAULT_OUTPUT_LANGUAGE: &str = "English";

/// One video to process
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub url: String,
    pub filename: Option<String>,
    pub video_language: Option<String>,
    /// English language name
    pub output_language: String,
    pub time_range: Option<TimeRange>,
}

/// A line that could not be turned into an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

fn non_empty(part: Option<&str>) -> Option<&str> {
    part.map(str::trim).filter(|p| !p.is_empty())
}

/// Parse one non-comment line. Unknown languages fall back to autodetect / English.
pub fn parse_line(line: &str, line_number: usize) -> Result<BulkItem, LineError> {
    let error = |message: String| LineError {
        line: line_number,
        message,
    };
    let mut parts = line.split(';');

    let url = non_empty(parts.next()).ok_or_else(|| error("Missing URL".to_string()))?;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(error("Invalid URL format".to_string()));
    }

    let filename = non_empty(parts.next()).map(str::to_string);
    let video_language = non_empty(parts.next())
        .filter(|code| is_valid_language_code(code))
        .map(str::to_string);
    let output_language = non_empty(parts.next())
        .and_then(normalize_language)
        .unwrap_or(DEFAULT_OUTPUT_LANGUAGE)
        .to_string();
    let time_range = non_empty(parts.next())
        .map(parse_time_range)
        .transpose()
        .map_err(|e| error(e.to_string()))?;

    Ok(BulkItem {
        url: url.to_string(),
        filename,
        video_language,
        output_language,
        time_range,
    })
}

/// Parse a whole input file, skipping blank lines and `#` comments
pub fn parse_input(content: &str) -> Vec<Result<BulkItem, LineError>> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| parse_line(line, number))
        .collect()
}

#[derive(Debug, Clone)]
pub struct BulkSettings {
    pub output_dir: PathBuf,
    pub delay: Duration,
    pub model: String,
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub successful: usize,
    /// (url, error message)
    pub failed: Vec<(String, String)>,
    /// Set when Ctrl-C stopped the batch early
    pub interrupted: bool,
}

impl BulkReport {
    pub fn all_failed(&self) -> bool {
        self.successful == 0 && !self.failed.is_empty()
    }
}

/// File name of the saved recipe for `item`
pub fn recipe_filename(item: &BulkItem, timestamp_ms: i64) -> String {
    match item.filename.as_deref().map(slugify).filter(|s| !s.is_empty()) {
        Some(slug) => format!("{}.json", slug),
        None => {
            let path = url::Url::parse(&item.url)
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            format!("recipe-{}-{}.json", slugify(&path), timestamp_ms)
        }
    }
}

fn log_failure(output_dir: &Path, url: &str, message: &str) -> Result<()> {
    let mut file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_dir.join(ERROR_LOG))?;
    write!(
        file,
        "[{}] {}\n  Error: {}\n\n",
        chrono::Utc::now().to_rfc3339(),
        url,
        message
    )?;
    Ok(())
}

async fn process_item(
    pipeline: &InsightPipeline,
    item: &BulkItem,
    settings: &BulkSettings,
) -> Result<PathBuf, String> {
    let archive = item
        .filename
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .map(|slug| ArchiveConfig {
            output_path: settings.output_dir.join(format!("{}.zip", slug)),
            include: vec![ArchiveInclude::Video],
            filename: Some(slug),
        });

    let options = RecipeFromVideoOptions {
        url: item.url.clone(),
        video_language: item.video_language.clone(),
        output_language: item.output_language.clone(),
        schema: settings.schema.clone(),
        model: settings.model.clone(),
        output_format: OutputFormat::Json,
        cookies: None,
        time_range: item.time_range,
        archive,
    };

    let result = pipeline
        .recipe_from_video(&options)
        .await
        .map_err(|e| e.to_string())?;

    let path = settings
        .output_dir
        .join(recipe_filename(item, chrono::Utc::now().timestamp_millis()));
    fs_err::write(&path, result.content.render()).map_err(|e| e.to_string())?;
    Ok(path)
}

/// Run every item in order, pausing `settings.delay` between items.
pub async fn process_items(
    pipeline: &InsightPipeline,
    items: &[BulkItem],
    settings: &BulkSettings,
) -> Result<BulkReport> {
    fs_err::create_dir_all(&settings.output_dir)?;
    let mut report = BulkReport::default();

    for (index, item) in items.iter().enumerate() {
        if index > 0 && !settings.delay.is_zero() {
            println!("  Waiting {}s before next video...", settings.delay.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(settings.delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!(remaining = items.len() - index, "Interrupted, stopping batch");
                    report.interrupted = true;
                    break;
                }
            }
        }

        let display_name = item
            .filename
            .clone()
            .unwrap_or_else(|| item.url.chars().take(50).collect());
        println!("[{}/{}] Processing: {}", index + 1, items.len(), display_name);

        match process_item(pipeline, item, settings).await {
            Ok(path) => {
                report.successful += 1;
                println!("  Saved: {}", path.display());
            }
            Err(message) => {
                println!("  Failed: {}", message);
                tracing::error!(url = %item.url, error = %message, "Bulk item failed");
                log_failure(&settings.output_dir, &item.url, &message)
                    .context("Failed to write error log")?;
                report.failed.push((item.url.clone(), message));
            }
        }
    }

    Ok(report)
}

/// Read `input`, report unparsable lines and process the rest
pub async fn run(pipeline: &InsightPipeline, input: &Path, settings: &BulkSettings) -> Result<BulkReport> {
    let content = fs_err::read_to_string(input)?;
    let (items, errors): (Vec<_>, Vec<_>) = parse_input(&content).into_iter().partition(|r| r.is_ok());
    let items: Vec<BulkItem> = items.into_iter().filter_map(Result::ok).collect();

    if !errors.is_empty() {
        println!("Parse errors in input file:");
        for err in errors.into_iter().filter_map(Result::err) {
            println!("  {}", err);
        }
        println!();
    }

    if items.is_empty() {
        anyhow::bail!("No valid video configurations found in {}", input.display());
    }

    println!("Processing {} video(s)...", items.len());
    println!("Output directory: {}", settings.output_dir.display());
    println!();

    let report = process_items(pipeline, &items, settings).await?;

    println!();
    println!("Done!");
    println!("  Successful: {}", report.successful);
    println!("  Failed: {}", report.failed.len());
    if !report.failed.is_empty() {
        println!("  See {} for details", settings.output_dir.join(ERROR_LOG).display());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{MockDownloader, ToolError};
    use crate::llm::FakeProvider;
    use crate::pipeline::test_support::*;
    use std::sync::Arc;

    #[test]
    fn test_parse_full_line() {
        let item = parse_line("https://youtube.com/watch?v=ghi789;ramen;ja;it;30:300", 3).unwrap();
        assert_eq!(item.filename.as_deref(), Some("ramen"));
        assert_eq!(item.video_language.as_deref(), Some("ja"));
        assert_eq!(item.output_language, "Italian");
        assert_eq!(item.time_range, Some(TimeRange { start: Some(30.0), end: Some(300.0) }));
    }

    #[test]
    fn test_parse_defaults_and_unknown_languages() {
        let item = parse_line("https://youtube.com/watch?v=abc;;xx;Klingon", 1).unwrap();
        assert_eq!(item.filename, None);
        assert_eq!(item.video_language, None);
        assert_eq!(item.output_language, "English");
        assert_eq!(item.time_range, None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_line("ftp://x", 4).unwrap_err().to_string(),
            "Line 4: Invalid URL format"
        );
        assert!(parse_line("https://x.test;a;;;50:10", 5).is_err());
    }

    #[test]
    fn test_parse_input_skips_comments_and_blanks() {
        let parsed = parse_input("# videos\n\nhttps://a.test/1\n  \nnot-a-url\nhttps://a.test/2;two\n");
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].is_ok());
        assert_eq!(parsed[1].as_ref().unwrap_err().line, 5);
        assert_eq!(parsed[2].as_ref().unwrap().filename.as_deref(), Some("two"));
    }

    #[test]
    fn test_recipe_filename() {
        let mut item = parse_line("https://youtube.com/shorts/XyZ", 1).unwrap();
        assert_eq!(recipe_filename(&item, 1700), "recipe-shorts-xyz-1700.json");
        item.filename = Some("Pasta Carbonara!".to_string());
        assert_eq!(recipe_filename(&item, 1700), "pasta-carbonara.json");
    }

    #[tokio::test]
    async fn test_failures_are_logged_and_batch_continues() {
        let out = tempfile::tempdir().unwrap();
        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|url, dir, _| {
            if url.contains("broken") {
                return Err(ToolError::Output("no formats found".to_string()));
            }
            let media_path = dir.join("video.mp4");
            std::fs::write(&media_path, b"m").map_err(ToolError::Io)?;
            Ok(crate::extractors::VideoArtifact {
                media_path,
                metadata_path: dir.join("video.info.json"),
            })
        });
        let pipeline = pipeline(
            downloader,
            transcriber_saying("t"),
            unused_webpage(),
            Arc::new(FakeProvider::with_reply("{\"title\":\"T\"}")),
        );

        let items = vec![
            parse_line("https://a.test/broken", 1).unwrap(),
            parse_line("https://a.test/ok;soup", 2).unwrap(),
        ];
        let settings = BulkSettings {
            output_dir: out.path().to_path_buf(),
            delay: Duration::ZERO,
            model: "gemini-test".to_string(),
            schema: "{}".to_string(),
        };

        let report = process_items(&pipeline, &items, &settings).await.unwrap();
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.all_failed());

        let log = std::fs::read_to_string(out.path().join(ERROR_LOG)).unwrap();
        assert!(log.contains("https://a.test/broken"));
        assert!(log.contains("Error: Failed to download video: no formats found"));

        let recipe = std::fs::read_to_string(out.path().join("soup.json")).unwrap();
        assert!(recipe.contains("\"source_url\": \"https://a.test/ok\""));

        let archive = zip::ZipArchive::new(std::fs::File::open(out.path().join("soup.zip")).unwrap()).unwrap();
        assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["soup.mp4"]);
    }
}
