use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::{RecipeResult, SummaryResult, VideoExtractResult};

/// Where command output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `None` and `-` both mean standard output
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path != Path::new("-") => OutputTarget::File(path.to_path_buf()),
            _ => OutputTarget::Stdout,
        }
    }
}

/// Text form of a command result
pub trait Render {
    fn render(&self) -> Result<String>;
}

impl Render for RecipeResult {
    fn render(&self) -> Result<String> {
        Ok(self.content.render())
    }
}

impl Render for SummaryResult {
    fn render(&self) -> Result<String> {
        Ok(self.content.clone())
    }
}

impl Render for VideoExtractResult {
    fn render(&self) -> Result<String> {
        to_pretty_json(self)
    }
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}

/// Save content to a file, creating parent directories
pub fn save_to_file(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content)?;
    Ok(())
}

/// Print content to the console
pub fn print_to_console(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", content).context("Failed to write to stdout")?;
    Ok(())
}

/// Send a rendered result to `target`
pub fn emit(result: &impl Render, target: &OutputTarget) -> Result<()> {
    let content = result.render()?;
    match target {
        OutputTarget::Stdout => print_to_console(&content),
        OutputTarget::File(path) => {
            save_to_file(&content, path)?;
            eprintln!("Result saved to: {}", path.display());
            Ok(())
        }
    }
}
