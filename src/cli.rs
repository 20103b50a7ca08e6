//! CLI interface for review-radar.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::ReviewEngine;
use crate::fixture::FixtureSource;

pub mod analyze;
pub mod config;

/// review-radar: Reviewer suggestions and merge risk for merge requests.
#[derive(Parser)]
#[command(name = "review-radar")]
#[command(about = "Suggests reviewers and scores merge risk", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Suggests reviewers for a merge request.
    Suggest(analyze::SuggestCommand),
    /// Assesses the merge risk of a merge request.
    Risk(analyze::RiskCommand),
    /// Runs both analyses for a merge request.
    Analyze(analyze::AnalyzeCommand),
    /// Configuration inspection.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Suggest(cmd) => cmd.execute().await,
            Commands::Risk(cmd) => cmd.execute().await,
            Commands::Analyze(cmd) => cmd.execute().await,
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}

/// Output encoding for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML document.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Renders `value` in this format.
    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            Self::Yaml => {
                serde_yaml::to_string(value).context("Failed to serialize output as YAML")
            }
            Self::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
            }
        }
    }
}

/// Arguments shared by every analysis command.
#[derive(Args)]
pub struct EngineArgs {
    /// Fixture file (YAML or JSON) with merge requests and review events.
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Configuration file; defaults to ~/.review-radar/config.yaml.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

impl EngineArgs {
    /// Loads the configuration named by `--config` or the default one.
    pub fn load_config(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                EngineConfig::load_from_path(path)
            }
            None => EngineConfig::load(),
        }
    }

    /// Builds an engine over the fixture named by `--data`.
    pub fn engine(&self) -> Result<ReviewEngine> {
        let config = self.load_config()?;
        let source = Arc::new(FixtureSource::load(&self.data)?);
        tracing::debug!(
            data = %self.data.display(),
            merge_requests = source.merge_request_count(),
            "Loaded fixture"
        );

        ReviewEngine::new(config, source.clone(), source).context("Failed to create engine")
    }
}
