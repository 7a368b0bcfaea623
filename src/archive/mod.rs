//! Packaging pipeline artifacts into a zip archive.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::result::WithError;
use crate::utils::{file_extension, sanitize_filename};
use crate::InsightError;

/// One member of the archive, either inline text or a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    Content { name: String, content: String },
    File { name: String, path: PathBuf },
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        match self {
            ArchiveEntry::Content { name, .. } | ArchiveEntry::File { name, .. } => name,
        }
    }
}

/// Artifacts a pipeline can put into its archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveInclude {
    Video,
    Transcription,
    Metadata,
    Result,
}

impl ArchiveInclude {
    pub const ALL: [ArchiveInclude; 4] = [
        ArchiveInclude::Video,
        ArchiveInclude::Transcription,
        ArchiveInclude::Metadata,
        ArchiveInclude::Result,
    ];
}

/// Where to write the archive, what goes in, and an optional base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub output_path: PathBuf,
    pub include: Vec<ArchiveInclude>,
    pub filename: Option<String>,
}

impl ArchiveConfig {
    pub fn includes(&self, tag: ArchiveInclude) -> bool {
        self.include.contains(&tag)
    }
}

/// The finished result of a pipeline, as it should appear in the archive
#[derive(Debug, Clone, Copy)]
pub struct ResultArtifact<'a> {
    pub content: &'a str,
    /// Member stem used when no custom filename is given (`recipe`, `summary`)
    pub default_stem: &'a str,
    pub extension: &'a str,
}

/// Everything a pipeline produced that could be archived
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveSources<'a> {
    pub video: Option<&'a Path>,
    pub transcription: Option<&'a str>,
    pub metadata: Option<&'a Path>,
    pub result: Option<ResultArtifact<'a>>,
}

/// Build the member list by filtering the closed include set.
///
/// With a custom filename the video and the result are named `<filename>.<ext>`;
/// the transcript and metadata keep their fixed names. Requested artifacts the
/// pipeline did not produce are skipped.
pub fn plan_entries(config: &ArchiveConfig, sources: &ArchiveSources<'_>) -> Vec<ArchiveEntry> {
    let custom = config.filename.as_deref().map(sanitize_filename);

    ArchiveInclude::ALL
        .iter()
        .filter(|tag| config.includes(**tag))
        .filter_map(|tag| match tag {
            ArchiveInclude::Video => sources.video.map(|path| {
                let ext = file_extension(path).unwrap_or_else(|| "mp4".to_string());
                let stem = custom.as_deref().unwrap_or("video");
                ArchiveEntry::File {
                    name: format!("{}.{}", stem, ext),
                    path: path.to_path_buf(),
                }
            }),
            ArchiveInclude::Transcription => sources.transcription.map(|text| ArchiveEntry::Content {
                name: "transcription.txt".to_string(),
                content: text.to_string(),
            }),
            ArchiveInclude::Metadata => sources.metadata.map(|path| ArchiveEntry::File {
                name: "metadata.json".to_string(),
                path: path.to_path_buf(),
            }),
            ArchiveInclude::Result => sources.result.map(|result| {
                let stem = custom.as_deref().unwrap_or(result.default_stem);
                ArchiveEntry::Content {
                    name: format!("{}.{}", stem, result.extension),
                    content: result.content.to_string(),
                }
            }),
        })
        .collect()
}

/// Write `entries` into a new zip at `output_path` (deflate, level 9).
pub async fn create_archive(output_path: &Path, entries: Vec<ArchiveEntry>) -> WithError<PathBuf> {
    let output_path = output_path.to_path_buf();

    tokio::task::spawn_blocking(move || write_zip(&output_path, &entries).map(|_| output_path))
        .await
        .map_err(|e| InsightError::Archive(e.to_string()))?
}

fn archive_err(e: impl std::fmt::Display) -> InsightError {
    InsightError::Archive(e.to_string())
}

fn write_zip(output_path: &Path, entries: &[ArchiveEntry]) -> WithError<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(archive_err)?;
    }

    let file = File::create(output_path).map_err(archive_err)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut seen = HashSet::new();
    for entry in entries {
        let name = sanitize_filename(entry.name());
        if !seen.insert(name.clone()) {
            return Err(InsightError::Archive(format!("duplicate archive member {}", name)));
        }

        zip.start_file(name.as_str(), options).map_err(archive_err)?;
        match entry {
            ArchiveEntry::Content { content, .. } => {
                zip.write_all(content.as_bytes()).map_err(archive_err)?;
            }
            ArchiveEntry::File { path, .. } => {
                let mut source = File::open(path)
                    .map_err(|e| InsightError::Archive(format!("{}: {}", path.display(), e)))?;
                std::io::copy(&mut source, &mut zip).map_err(archive_err)?;
            }
        }
        tracing::debug!(member = %name, "Added archive member");
    }

    zip.finish().map_err(archive_err)?;
    tracing::info!(path = %output_path.display(), members = entries.len(), "Archive written");
    Ok(())
}
