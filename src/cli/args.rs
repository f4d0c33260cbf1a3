//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `run`: Compile and execute a migration plan
//! - `validate`: Compile a migration plan without running it
//! - `show-config`: Show configuration discovery information

use crate::environment::parse_property_override;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    Validate { plan: PathBuf },
    ShowConfig,
}

#[derive(Debug)]
pub struct RunConfig {
    pub plan: PathBuf,
    pub config_override: Option<PathBuf>,
    pub properties: Vec<(String, String)>,
    pub non_interactive: bool,
    pub report_json: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "server-migration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Composes and runs server configuration migration tasks")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile and execute a migration plan
    Run {
        /// Path to the migration plan (TOML)
        plan: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Set an environment property (can be used multiple times)
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_property_override)]
        properties: Vec<(String, String)>,
        /// Never prompt, even if the configuration asks for it
        #[arg(long = "non-interactive")]
        non_interactive: bool,
        /// Write the JSON report to this file
        #[arg(long = "report-json", value_name = "FILE")]
        report_json: Option<PathBuf>,
        /// Write the text summary to this file
        #[arg(long = "summary", value_name = "FILE")]
        summary: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Compile a migration plan without running it
    Validate {
        /// Path to the migration plan (TOML)
        plan: PathBuf,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                plan,
                config,
                properties,
                non_interactive,
                report_json,
                summary,
                verbose,
            }) => Ok(ExecutionMode::Run(RunConfig {
                plan: plan.clone(),
                config_override: config.clone(),
                properties: properties.clone(),
                non_interactive: *non_interactive,
                report_json: report_json.clone(),
                summary: summary.clone(),
                verbose: *verbose,
            })),
            Some(Commands::Validate { plan }) => Ok(ExecutionMode::Validate { plan: plan.clone() }),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err(
                "No command specified. Use 'server-migration --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    /// Whether the selected command asked for verbose logging
    pub fn verbose(&self) -> bool {
        matches!(self.command, Some(Commands::Run { verbose: true, .. }))
    }
}
