use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

use super::{ToolError, Transcriber};
use crate::result::WithError;

/// Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
    #[default]
    Turbo,
    #[value(name = "large-v3")]
    #[serde(rename = "large-v3")]
    LargeV3,
}

impl WhisperModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
            WhisperModel::Turbo => "turbo",
            WhisperModel::LargeV3 => "large-v3",
        }
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            "turbo" => Ok(WhisperModel::Turbo),
            "large-v3" => Ok(WhisperModel::LargeV3),
            other => Err(format!("unknown whisper model '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperOutputFormat {
    Txt,
    Vtt,
    Srt,
    Tsv,
    Json,
    All,
}

impl WhisperOutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperOutputFormat::Txt => "txt",
            WhisperOutputFormat::Vtt => "vtt",
            WhisperOutputFormat::Srt => "srt",
            WhisperOutputFormat::Tsv => "tsv",
            WhisperOutputFormat::Json => "json",
            WhisperOutputFormat::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperTask {
    Transcribe,
    Translate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WhisperDevice {
    Cpu,
    Cuda,
}

impl WhisperDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperDevice::Cpu => "cpu",
            WhisperDevice::Cuda => "cuda",
        }
    }
}

/// Options forwarded to the whisper CLI. Unset fields are left to whisper's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    pub model: Option<WhisperModel>,
    /// ISO code of the spoken language; detected when absent
    pub language: Option<String>,
    pub output_format: Option<WhisperOutputFormat>,
    pub task: Option<WhisperTask>,
    pub device: Option<WhisperDevice>,
    pub word_timestamps: Option<bool>,
    pub temperature: Option<f64>,
    pub beam_size: Option<u32>,
    pub best_of: Option<u32>,
    pub threads: Option<u32>,
    pub fp16: Option<bool>,
    pub verbose: Option<bool>,
    pub compression_ratio_threshold: Option<f64>,
    pub logprob_threshold: Option<f64>,
    pub no_speech_threshold: Option<f64>,
    pub initial_prompt: Option<String>,
    pub condition_on_previous_text: Option<bool>,
}

// whisper parses booleans with Python's spelling
fn py_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

fn push_opt<T: ToString>(args: &mut Vec<String>, flag: &str, value: Option<T>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

/// Build the whisper argument list; the media path always comes first.
pub fn build_whisper_args(media_path: &Path, output_dir: Option<&Path>, options: &TranscribeOptions) -> Vec<String> {
    let mut args = vec![media_path.to_string_lossy().into_owned()];

    push_opt(&mut args, "--model", options.model.map(|m| m.as_str()));
    push_opt(&mut args, "--language", options.language.as_deref());
    push_opt(&mut args, "--output_format", options.output_format.map(|f| f.as_str()));
    push_opt(&mut args, "--output_dir", output_dir.map(|d| d.to_string_lossy().into_owned()));
    push_opt(
        &mut args,
        "--task",
        options.task.map(|t| match t {
            WhisperTask::Transcribe => "transcribe",
            WhisperTask::Translate => "translate",
        }),
    );
    push_opt(&mut args, "--device", options.device.map(|d| d.as_str()));
    push_opt(&mut args, "--word_timestamps", options.word_timestamps.map(py_bool));
    push_opt(&mut args, "--temperature", options.temperature);
    push_opt(&mut args, "--beam_size", options.beam_size);
    push_opt(&mut args, "--best_of", options.best_of);
    push_opt(&mut args, "--threads", options.threads);
    push_opt(&mut args, "--fp16", options.fp16.map(py_bool));
    push_opt(&mut args, "--verbose", options.verbose.map(py_bool));
    push_opt(&mut args, "--compression_ratio_threshold", options.compression_ratio_threshold);
    push_opt(&mut args, "--logprob_threshold", options.logprob_threshold);
    push_opt(&mut args, "--no_speech_threshold", options.no_speech_threshold);
    if let Some(prompt) = options.initial_prompt.as_deref().filter(|p| !p.is_empty()) {
        args.push("--initial_prompt".to_string());
        args.push(prompt.to_string());
    }
    push_opt(
        &mut args,
        "--condition_on_previous_text",
        options.condition_on_previous_text.map(py_bool),
    );

    args
}

/// Speech-to-text backed by the openai-whisper executable
pub struct WhisperTranscriber {
    whisper_path: String,
}

impl WhisperTranscriber {
    pub fn new() -> Self {
        Self {
            whisper_path: "whisper".to_string(),
        }
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            whisper_path: path.into(),
        }
    }
}

impl Default for WhisperTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        media_path: &Path,
        output_dir: &Path,
        options: &TranscribeOptions,
    ) -> WithError<String, ToolError> {
        let mut options = options.clone();
        options.output_format.get_or_insert(WhisperOutputFormat::Txt);
        let args = build_whisper_args(media_path, Some(output_dir), &options);

        tracing::info!(path = %media_path.display(), "Transcribing audio");
        tracing::debug!("whisper {}", args.join(" "));

        let output = Command::new(&self.whisper_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ToolError::NotInstalled { tool: "whisper" },
                _ => ToolError::Io(e),
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: "whisper",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        read_transcript(media_path, output_dir).await
    }
}

/// whisper writes `<output_dir>/<media stem>.txt`
pub(crate) async fn read_transcript(media_path: &Path, output_dir: &Path) -> WithError<String, ToolError> {
    let stem = media_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ToolError::Output(format!("invalid media path {}", media_path.display())))?;
    let transcript_path = output_dir.join(format!("{}.txt", stem));

    let text = tokio::fs::read_to_string(&transcript_path)
        .await
        .map_err(|e| ToolError::Output(format!("could not read {}: {}", transcript_path.display(), e)))?;

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_minimal_args() {
        let args = build_whisper_args(Path::new("/path/to/audio.m4a"), None, &TranscribeOptions::default());
        assert_eq!(args, vec!["/path/to/audio.m4a"]);
    }

    #[test]
    fn test_full_args_in_order() {
        let options = TranscribeOptions {
            model: Some(WhisperModel::LargeV3),
            language: Some("en".to_string()),
            output_format: Some(WhisperOutputFormat::Json),
            task: Some(WhisperTask::Translate),
            device: Some(WhisperDevice::Cuda),
            word_timestamps: Some(true),
            temperature: Some(0.0),
            beam_size: Some(5),
            best_of: Some(3),
            threads: Some(8),
            fp16: Some(false),
            verbose: Some(true),
            compression_ratio_threshold: Some(2.4),
            logprob_threshold: Some(-1.0),
            no_speech_threshold: Some(0.6),
            initial_prompt: Some("Cooking show".to_string()),
            condition_on_previous_text: Some(false),
        };

        let out = PathBuf::from("/output/directory");
        let args = build_whisper_args(Path::new("/path/complex audio.wav"), Some(&out), &options);

        assert_eq!(
            args,
            vec![
                "/path/complex audio.wav",
                "--model",
                "large-v3",
                "--language",
                "en",
                "--output_format",
                "json",
                "--output_dir",
                "/output/directory",
                "--task",
                "translate",
                "--device",
                "cuda",
                "--word_timestamps",
                "True",
                "--temperature",
                "0",
                "--beam_size",
                "5",
                "--best_of",
                "3",
                "--threads",
                "8",
                "--fp16",
                "False",
                "--verbose",
                "True",
                "--compression_ratio_threshold",
                "2.4",
                "--logprob_threshold",
                "-1",
                "--no_speech_threshold",
                "0.6",
                "--initial_prompt",
                "Cooking show",
                "--condition_on_previous_text",
                "False",
            ]
        );
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!("large-v3".parse::<WhisperModel>(), Ok(WhisperModel::LargeV3));
        assert_eq!("Turbo".parse::<WhisperModel>(), Ok(WhisperModel::Turbo));
        assert!("huge".parse::<WhisperModel>().is_err());
    }

    #[tokio::test]
    async fn test_read_transcript_uses_media_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video.txt"), "  hello world\n").unwrap();

        let text = read_transcript(&dir.path().join("video.mp4"), dir.path()).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_read_transcript_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_transcript(&dir.path().join("clip.mkv"), dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("clip.txt"));
    }
}
