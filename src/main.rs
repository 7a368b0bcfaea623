use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_insights::bulk::{self, BulkSettings};
use video_insights::cli::{Cli, Commands, RecipeCommand, SummaryCommand, VideoCommand};
use video_insights::config::{Config, CredentialSource, EnvOrPrompt};
use video_insights::extractors::MetadataRequest;
use video_insights::llm::LlmModel;
use video_insights::output::{self, OutputTarget};
use video_insights::pipeline::{
    RecipeFromHtmlOptions, RecipeFromVideoOptions, SummaryFromHtmlOptions, SummaryFromVideoOptions,
    VideoExtractOptions,
};
use video_insights::prompts::load_recipe_schema;
use video_insights::{utils, InsightPipeline, WithError};

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "video_insights=debug,insights=debug"
    } else {
        "video_insights=info,insights=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Show a spinner while `task` runs, unless quiet
async fn with_spinner<T>(quiet: bool, message: &str, task: impl Future<Output = WithError<T>>) -> Result<T> {
    let progress = (!quiet).then(|| {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            progress.set_style(style);
        }
        progress.set_message(message.to_string());
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    });

    let result = task.await;

    if let Some(progress) = progress {
        match &result {
            Ok(_) => progress.finish_with_message("Done"),
            Err(_) => progress.finish_with_message("Failed"),
        }
    }

    Ok(result?)
}

fn model_id(config: &Config, choice: Option<LlmModel>) -> String {
    choice
        .map(|m| m.api_id().to_string())
        .unwrap_or_else(|| config.llm.model.clone())
}

async fn build_pipeline(config: &Config) -> Result<InsightPipeline> {
    let api_key = EnvOrPrompt::new(&config.llm.api_key_env).api_key().await?;
    Ok(InsightPipeline::from_config(config, api_key)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let quiet = cli.quiet;

    match cli.command {
        Commands::Recipe { source } => {
            let config = Config::load().await?;
            let pipeline = build_pipeline(&config).await?;

            match source {
                RecipeCommand::VideoUrl {
                    url,
                    video_language,
                    common,
                    cookies,
                    time_range,
                    archive,
                } => {
                    let options = RecipeFromVideoOptions {
                        url,
                        video_language,
                        output_language: common
                            .output_language
                            .unwrap_or_else(|| config.app.default_output_language.clone()),
                        schema: load_recipe_schema(common.recipe_schema.as_deref(), common.output_format)?,
                        model: model_id(&config, common.llm_model),
                        output_format: common.output_format,
                        cookies: cookies.to_config()?,
                        time_range,
                        archive: archive.to_config(),
                    };

                    let result = with_spinner(
                        quiet,
                        "Downloading, transcribing and extracting recipe...",
                        pipeline.recipe_from_video(&options),
                    )
                    .await?;

                    output::emit(&result, &OutputTarget::from_arg(common.output.as_deref()))?;
                    if let Some(path) = &result.archive_path {
                        eprintln!("Archive saved to: {}", path.display());
                    }
                }
                RecipeCommand::Html { url, common } => {
                    let options = RecipeFromHtmlOptions {
                        url,
                        output_language: common
                            .output_language
                            .unwrap_or_else(|| config.app.default_output_language.clone()),
                        schema: load_recipe_schema(common.recipe_schema.as_deref(), common.output_format)?,
                        model: model_id(&config, common.llm_model),
                        output_format: common.output_format,
                    };

                    let result =
                        with_spinner(quiet, "Fetching page and extracting recipe...", pipeline.recipe_from_html(&options))
                            .await?;

                    output::emit(&result, &OutputTarget::from_arg(common.output.as_deref()))?;
                }
            }
        }
        Commands::Summary { source } => {
            let config = Config::load().await?;
            let pipeline = build_pipeline(&config).await?;

            match source {
                SummaryCommand::VideoUrl {
                    url,
                    video_language,
                    common,
                    cookies,
                    time_range,
                    archive,
                } => {
                    let options = SummaryFromVideoOptions {
                        url,
                        video_language,
                        output_language: common
                            .output_language
                            .unwrap_or_else(|| config.app.default_output_language.clone()),
                        model: model_id(&config, common.llm_model),
                        cookies: cookies.to_config()?,
                        time_range,
                        custom_prompt: common.custom_prompt,
                        archive: archive.to_config(),
                    };

                    let result = with_spinner(
                        quiet,
                        "Downloading, transcribing and summarizing...",
                        pipeline.summary_from_video(&options),
                    )
                    .await?;

                    output::emit(&result, &OutputTarget::from_arg(common.output.as_deref()))?;
                    if let Some(path) = &result.archive_path {
                        eprintln!("Archive saved to: {}", path.display());
                    }
                }
                SummaryCommand::Html { url, common } => {
                    let options = SummaryFromHtmlOptions {
                        url,
                        output_language: common
                            .output_language
                            .unwrap_or_else(|| config.app.default_output_language.clone()),
                        model: model_id(&config, common.llm_model),
                        custom_prompt: common.custom_prompt,
                    };

                    let result =
                        with_spinner(quiet, "Fetching page and summarizing...", pipeline.summary_from_html(&options))
                            .await?;

                    output::emit(&result, &OutputTarget::from_arg(common.output.as_deref()))?;
                }
            }
        }
        Commands::Video {
            action:
                VideoCommand::Extract {
                    url,
                    types,
                    metadata_fields,
                    platform,
                    video_language,
                    output,
                    cookies,
                    time_range,
                    archive,
                },
        } => {
            let config = Config::load().await?;
            // Extraction never calls the model, so no API key is needed.
            let pipeline = InsightPipeline::from_config(&config, String::new())?;

            let metadata = if metadata_fields.is_empty() {
                None
            } else {
                Some(MetadataRequest::parse(&platform, &metadata_fields)?)
            };

            let options = VideoExtractOptions {
                url,
                video_language,
                cookies: cookies.to_config()?,
                time_range,
                extract_types: (!types.is_empty()).then_some(types),
                metadata,
                archive: archive.to_config(),
            };

            let result = with_spinner(quiet, "Downloading and extracting video data...", pipeline.extract_from_video(&options))
                .await?;

            output::emit(&result, &OutputTarget::from_arg(output.as_deref()))?;
        }
        Commands::Bulk { input, output_dir } => {
            let config = Config::load().await?;
            let pipeline = build_pipeline(&config).await?;

            let settings = BulkSettings {
                output_dir,
                delay: Duration::from_secs(config.app.bulk_delay_secs),
                model: config.llm.model.clone(),
                schema: load_recipe_schema(None, video_insights::OutputFormat::Json)?,
            };

            let report = bulk::run(&pipeline, &input, &settings).await?;
            if report.all_failed() {
                anyhow::bail!("All {} item(s) failed", report.failed.len());
            }
        }
        Commands::Doctor => {
            let statuses = utils::check_dependencies().await;
            let mut missing = 0;

            for status in &statuses {
                if status.installed {
                    println!(
                        "  ✓ {} ({}) {}",
                        status.name,
                        status.purpose,
                        status.version.as_deref().unwrap_or("")
                    );
                } else {
                    missing += 1;
                    println!("  ✗ {} ({}) not found on PATH", status.name, status.purpose);
                }
            }

            if missing > 0 {
                anyhow::bail!("{} required tool(s) missing", missing);
            }
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                let path = Config::config_path().context("Could not locate config file")?;
                println!("Configuration file: {}", path.display());
                println!("Run with --show to print the active settings.");
            }
        }
    }

    Ok(())
}
