//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// cyris - cyber-range orchestrator
#[derive(Parser, Debug)]
#[command(name = "cyris")]
#[command(about = "Materialise, monitor, and destroy cyber-range ensembles of KVM virtual machines")]
#[command(version)]
pub struct Args {
    /// Path to the legacy INI global configuration file
    #[arg(long, global = true, env = "CYRIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, global = true, value_enum, default_value = "text", env = "CYRIS_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a range from a description file
    Create {
        /// Path to the YAML range description
        description: PathBuf,

        /// Use this range ID instead of the one in clone_settings (or a generated one)
        #[arg(long)]
        range_id: Option<String>,

        /// Parse and validate the description, report the plan, and exit without side effects
        #[arg(long)]
        dry_run: bool,

        /// Run only image acquisition and domain creation (steps 1-4), skip discovery/tasks
        #[arg(long)]
        build_only: bool,
    },

    /// Destroy a range, tearing down its domains and networks
    Destroy {
        range_id: String,

        /// Continue tearing down remaining resources even if one step fails
        #[arg(long)]
        force: bool,

        /// Remove the persisted range record after a successful destroy
        #[arg(long)]
        rm: bool,
    },

    /// Show a range's merged persisted + live state
    Status { range_id: String },

    /// List all known ranges
    List {
        /// Include destroyed ranges
        #[arg(long)]
        all: bool,
    },

    /// Print SSH connection info for a range's guests
    SshInfo { range_id: String },

    /// Validate a description without creating anything
    Validate { description: PathBuf },

    /// Write a commented INI configuration template to stdout
    ConfigInit,

    /// Print the fully resolved configuration (secrets redacted) as YAML
    ConfigShow,
}
