//! Configuration-related CLI commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::OutputFormat;
use crate::config::EngineConfig;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the effective configuration.
    Show(ShowCommand),
    /// Prints the default config file location.
    Path,
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Configuration file; defaults to ~/.review-radar/config.yaml.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(),
            ConfigSubcommands::Path => {
                println!("{}", EngineConfig::default_path()?.display());
                Ok(())
            }
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => EngineConfig::load_from_path(path)?,
            None => EngineConfig::load()?,
        };
        print!("{}", self.format.render(&config)?);
        Ok(())
    }
}
