use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::archive::{ArchiveConfig, ArchiveInclude};
use crate::extractors::{Browser, CookieConfig, Keyring, TimeRange};
use crate::llm::LlmModel;
use crate::pipeline::ExtractType;
use crate::response::OutputFormat;
use crate::result::WithError;

#[derive(Parser, Debug)]
#[command(
    name = "insights",
    about = "Extract recipes, summaries and transcripts from videos and webpages",
    version,
    long_about = "Downloads videos with yt-dlp, transcribes them locally with Whisper and asks a Gemini model to turn the result into a structured recipe or markdown notes. Webpages are fetched and reduced to their readable article first."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a structured recipe
    Recipe {
        #[command(subcommand)]
        source: RecipeCommand,
    },

    /// Write markdown notes about a video or an article
    Summary {
        #[command(subcommand)]
        source: SummaryCommand,
    },

    /// Work with raw video data
    Video {
        #[command(subcommand)]
        action: VideoCommand,
    },

    /// Extract recipes for every line of a semicolon-separated list
    Bulk {
        /// Input file: url;filename;video_lang;output_lang;range per line
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Directory for recipes, archives and the error log
        #[arg(value_name = "OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },

    /// Check that yt-dlp and whisper are installed
    Doctor,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecipeCommand {
    /// Extract a recipe from a video URL
    VideoUrl {
        #[arg(value_name = "URL")]
        url: String,

        /// Spoken language of the video (ISO 639-1 code); autodetected when omitted
        #[arg(long, value_name = "CODE")]
        video_language: Option<String>,

        #[command(flatten)]
        common: RecipeArgs,

        #[command(flatten)]
        cookies: CookieArgs,

        /// Only download this part of the video, as START:END seconds
        #[arg(long, value_name = "START:END")]
        time_range: Option<TimeRange>,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Extract a recipe from a webpage
    Html {
        #[arg(value_name = "URL")]
        url: String,

        #[command(flatten)]
        common: RecipeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum SummaryCommand {
    /// Summarize a video URL
    VideoUrl {
        #[arg(value_name = "URL")]
        url: String,

        /// Spoken language of the video (ISO 639-1 code); autodetected when omitted
        #[arg(long, value_name = "CODE")]
        video_language: Option<String>,

        #[command(flatten)]
        common: SummaryArgs,

        #[command(flatten)]
        cookies: CookieArgs,

        /// Only download this part of the video, as START:END seconds
        #[arg(long, value_name = "START:END")]
        time_range: Option<TimeRange>,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Summarize a webpage
    Html {
        #[arg(value_name = "URL")]
        url: String,

        #[command(flatten)]
        common: SummaryArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum VideoCommand {
    /// Download a video and extract its description, transcript and metadata
    Extract {
        #[arg(value_name = "URL")]
        url: String,

        /// What to extract; both description and transcription when omitted
        #[arg(short = 't', long = "type", value_enum, value_name = "TYPE")]
        types: Vec<ExtractType>,

        /// Metadata fields to return, validated against the platform
        #[arg(long = "metadata-field", value_name = "FIELD", value_delimiter = ',')]
        metadata_fields: Vec<String>,

        /// Platform the metadata fields belong to
        #[arg(long, default_value = "youtube", value_parser = ["youtube", "instagram"])]
        platform: String,

        /// Spoken language of the video (ISO 639-1 code)
        #[arg(long, value_name = "CODE")]
        video_language: Option<String>,

        /// Output file path, `-` for stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        cookies: CookieArgs,

        /// Only download this part of the video, as START:END seconds
        #[arg(long, value_name = "START:END")]
        time_range: Option<TimeRange>,

        #[command(flatten)]
        archive: ArchiveArgs,
    },
}

/// Options shared by both recipe sources
#[derive(Args, Debug, Clone)]
pub struct RecipeArgs {
    /// Output language, as a code (it) or a name (Italian)
    #[arg(long, value_name = "LANG")]
    pub output_language: Option<String>,

    /// JSON schema file describing the recipe; a built-in schema is used otherwise
    #[arg(long, value_name = "FILE")]
    pub recipe_schema: Option<PathBuf>,

    /// Output file path, `-` for stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Model to use; defaults to the configured model
    #[arg(long, value_enum)]
    pub llm_model: Option<LlmModel>,
}

/// Options shared by both summary sources
#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Output language, as a code (de) or a name (German)
    #[arg(long, value_name = "LANG")]
    pub output_language: Option<String>,

    /// Instructions that replace the default notes template
    #[arg(long, value_name = "PROMPT")]
    pub custom_prompt: Option<String>,

    /// Output file path, `-` for stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Model to use; defaults to the configured model
    #[arg(long, value_enum)]
    pub llm_model: Option<LlmModel>,
}

/// Cookie source for yt-dlp
#[derive(Args, Debug, Clone, Default)]
pub struct CookieArgs {
    /// Read cookies from this browser
    #[arg(short = 'c', long, value_enum, conflicts_with = "cookies_file")]
    pub cookies_from_browser: Option<Browser>,

    /// Browser profile to read cookies from
    #[arg(short = 'p', long, value_name = "PROFILE", requires = "cookies_from_browser")]
    pub browser_profile: Option<String>,

    /// Keyring used to decrypt browser cookies
    #[arg(long, value_enum, requires = "cookies_from_browser")]
    pub keyring: Option<Keyring>,

    /// Netscape-format cookie file
    #[arg(short = 'f', long, value_name = "FILE")]
    pub cookies_file: Option<PathBuf>,
}

impl CookieArgs {
    pub fn to_config(&self) -> WithError<Option<CookieConfig>> {
        CookieConfig::from_parts(
            self.cookies_file.clone(),
            self.cookies_from_browser,
            self.browser_profile.clone(),
            self.keyring,
        )
    }
}

/// Optional zip archive of the run's artifacts
#[derive(Args, Debug, Clone, Default)]
pub struct ArchiveArgs {
    /// Write the selected artifacts into this zip file
    #[arg(long, value_name = "ZIP")]
    pub archive: Option<PathBuf>,

    /// Artifacts to archive; everything when omitted
    #[arg(long, value_enum, value_delimiter = ',', requires = "archive")]
    pub include: Vec<ArchiveInclude>,

    /// Base name for the archived video and result
    #[arg(long, value_name = "NAME", requires = "archive")]
    pub archive_name: Option<String>,
}

impl ArchiveArgs {
    pub fn to_config(&self) -> Option<ArchiveConfig> {
        self.archive.as_ref().map(|path| ArchiveConfig {
            output_path: path.clone(),
            include: if self.include.is_empty() {
                ArchiveInclude::ALL.to_vec()
            } else {
                self.include.clone()
            },
            filename: self.archive_name.clone(),
        })
    }
}
