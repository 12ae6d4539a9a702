//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for p21-extract using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// P21 Extract - Prophet 21 OData report extraction tool
#[derive(Parser, Debug)]
#[command(name = "p21-extract")]
#[command(version, about, long_about = None)]
#[command(author = "P21 Extract Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "p21-extract.toml", env = "P21_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "P21_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured reports and write CSV files
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
