//! CLI parse: clap types for tabrelay. No behavior; definitions only.

use crate::channel::TabId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tabrelay CLI - controller/surface coordination tooling
#[derive(Parser)]
#[command(name = "tabrelay")]
#[command(about = "Inspect shared settings, list models and simulate tab surfaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List models offered by the configured provider
    Models {
        /// Store this model as the active model
        #[arg(long)]
        select: Option<String>,
    },
    /// Print a shared setting
    Get {
        /// Setting key (activeModel, apiKey)
        key: String,
    },
    /// Write a shared setting (JSON string or null, or a bare string)
    Set {
        /// Setting key (activeModel, apiKey)
        key: String,
        /// New value
        value: String,
    },
    /// Restore a shared setting to its default
    Reset {
        /// Setting key (activeModel, apiKey)
        key: String,
    },
    /// Drive a controller against an in-process tab and report what happened
    Simulate {
        /// Tab to activate
        #[arg(long, default_value = "1")]
        tab: TabId,
        /// Start with a surface already listening on the tab
        #[arg(long)]
        surface_present: bool,
        /// Treat the tab as a restricted page that refuses activation
        #[arg(long)]
        restricted: bool,
        /// Number of user activations to perform
        #[arg(long, default_value = "1")]
        toggles: u32,
    },
    /// Print the effective configuration
    Config,
}

impl Commands {
    /// Stable command name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Models { .. } => "models",
            Commands::Get { .. } => "get",
            Commands::Set { .. } => "set",
            Commands::Reset { .. } => "reset",
            Commands::Simulate { .. } => "simulate",
            Commands::Config => "config",
        }
    }
}
