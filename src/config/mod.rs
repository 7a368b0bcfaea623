use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::extractors::whisper::{WhisperDevice, WhisperModel};
use crate::llm::{LlmModel, DEFAULT_BASE_URL, INITIAL_DELAY, MAX_RETRIES};
use crate::utils::normalize_language;
use crate::workspace::DEFAULT_PREFIX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model API settings
    pub llm: LlmConfig,

    /// Speech-to-text settings
    pub transcription: TranscriptionConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model id sent to the API when no --llm-model is given
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub base_url: String,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Base delay of the linear backoff
    pub initial_delay_ms: u64,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name
    pub model: String,

    /// Force a device instead of letting whisper pick one
    pub device: Option<WhisperDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix for temporary workspaces
    pub temp_prefix: String,

    /// Output language used when none is given on the command line
    pub default_output_language: String,

    /// Pause between bulk items
    pub bulk_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                model: LlmModel::default().api_id().to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                max_retries: MAX_RETRIES,
                initial_delay_ms: INITIAL_DELAY.as_millis() as u64,
                request_timeout_secs: 120,
            },
            transcription: TranscriptionConfig {
                model: WhisperModel::default().to_string(),
                device: None,
            },
            app: AppConfig {
                temp_prefix: DEFAULT_PREFIX.to_string(),
                default_output_language: "en".to_string(),
                bulk_delay_secs: 10,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            tracing::debug!(path = %config_path.display(), "Loaded configuration");
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            tracing::info!(path = %config_path.display(), "Wrote default configuration");
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("video-insights").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        if self.llm.request_timeout_secs == 0 {
            anyhow::bail!("llm.request_timeout_secs must be greater than zero");
        }
        url::Url::parse(&self.llm.base_url)
            .with_context(|| format!("llm.base_url is not a valid URL: {}", self.llm.base_url))?;

        self.transcription
            .model
            .parse::<WhisperModel>()
            .map_err(|e| anyhow::anyhow!("transcription.model: {}", e))?;

        if normalize_language(&self.app.default_output_language).is_none() {
            anyhow::bail!(
                "app.default_output_language is not a supported language: {}",
                self.app.default_output_language
            );
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  LLM Model: {}", self.llm.model);
        println!("  API Key Variable: {}", self.llm.api_key_env);
        println!("  API Base URL: {}", self.llm.base_url);
        println!(
            "  Retries: {} (initial delay {}ms)",
            self.llm.max_retries, self.llm.initial_delay_ms
        );
        println!("  Request Timeout: {}s", self.llm.request_timeout_secs);
        println!("  Whisper Model: {}", self.transcription.model);
        if let Some(device) = &self.transcription.device {
            println!("  Whisper Device: {}", device.as_str());
        }
        println!("  Output Language: {}", self.app.default_output_language);
        println!("  Bulk Delay: {}s", self.app.bulk_delay_secs);
    }
}

/// Supplies the model API key on demand
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn api_key(&self) -> Result<String>;
}

/// Reads the key from an environment variable, prompting on the terminal when unset.
#[derive(Debug, Clone)]
pub struct EnvOrPrompt {
    pub env_var: String,
    pub interactive: bool,
}

impl EnvOrPrompt {
    pub fn new(env_var: &str) -> Self {
        Self {
            env_var: env_var.to_string(),
            interactive: true,
        }
    }

    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }
}

#[async_trait]
impl CredentialSource for EnvOrPrompt {
    async fn api_key(&self) -> Result<String> {
        if let Some(key) = std::env::var(&self.env_var).ok().filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }

        if !self.interactive || !console::user_attended_stderr() {
            anyhow::bail!("API key not found; set the {} environment variable", self.env_var);
        }

        let prompt = format!("{} is not set. Enter your API key: ", self.env_var);
        let key = tokio::task::spawn_blocking(move || {
            let term = console::Term::stderr();
            term.write_str(&prompt)?;
            term.read_secure_line()
        })
        .await
        .context("API key prompt was interrupted")?
        .context("Failed to read API key")?;

        let key = key.trim().to_string();
        if key.is_empty() {
            anyhow::bail!("No API key entered");
        }
        Ok(key)
    }
}

/// A fixed key, for tests and callers that already hold one
#[derive(Debug, Clone)]
pub struct StaticCredential(pub String);

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn api_key(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.llm.model, "gemini-flash-lite-latest");
        assert_eq!(config.transcription.model, "turbo");
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("api_key_env: GEMINI_API_KEY"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transcription.model = "enormous".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.app.default_output_language = "xx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_credential() {
        let source = EnvOrPrompt::new("VIDEO_INSIGHTS_TEST_KEY_PRESENT").non_interactive();
        std::env::set_var("VIDEO_INSIGHTS_TEST_KEY_PRESENT", "secret");
        assert_eq!(tokio_test::block_on(source.api_key()).unwrap(), "secret");
    }

    #[test]
    fn test_missing_credential_non_interactive() {
        let source = EnvOrPrompt::new("VIDEO_INSIGHTS_TEST_KEY_ABSENT").non_interactive();
        let err = tokio_test::block_on(source.api_key()).unwrap_err();
        assert!(err.to_string().contains("VIDEO_INSIGHTS_TEST_KEY_ABSENT"));
    }

    #[tokio::test]
    async fn test_static_credential() {
        assert_eq!(StaticCredential("k".to_string()).api_key().await.unwrap(), "k");
    }
}
