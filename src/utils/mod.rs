use std::path::Path;
use tokio::process::Command;

pub mod language;

pub use language::{is_valid_language_code, language_name, normalize_language};

/// Sanitize an archive member or output file name.
///
/// Keeps alphanumerics, hyphens, underscores and dots; everything else becomes `_`.
/// Leading dots are dropped so names can never escape the archive root.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Lowercase, dash-separated slug capped at 100 characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug.chars().take(100).collect::<String>().trim_end_matches('-').to_string()
}

/// Lowercased extension of a path, if any.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Result of probing one external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatus {
    pub name: &'static str,
    pub purpose: &'static str,
    pub installed: bool,
    pub version: Option<String>,
}

/// Probe the external tools the pipelines shell out to
pub async fn check_dependencies() -> Vec<DependencyStatus> {
    vec![
        probe("yt-dlp", "--version", "video download").await,
        probe("whisper", "--help", "speech-to-text transcription").await,
    ]
}

async fn probe(command: &'static str, flag: &str, purpose: &'static str) -> DependencyStatus {
    let output = Command::new(command).arg(flag).output().await;

    match output {
        Ok(output) if output.status.success() => {
            let version = (flag == "--version")
                .then(|| {
                    String::from_utf8_lossy(&output.stdout)
                        .lines()
                        .next()
                        .map(|line| line.trim().to_string())
                })
                .flatten();
            DependencyStatus {
                name: command,
                purpose,
                installed: true,
                version,
            }
        }
        Ok(_) | Err(_) => DependencyStatus {
            name: command,
            purpose,
            installed: false,
            version: None,
        },
    }
}
