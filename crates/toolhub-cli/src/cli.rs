//! CLI argument definitions.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// toolhub -- typed tools over third-party HTTP APIs.
#[derive(Parser)]
#[command(
    name = "toolhub",
    version,
    about = "Discover and call typed tools over third-party HTTP APIs",
    long_about = "Each provider is enabled when its credentials are present in the \
                  environment (or a local .env file). Results are printed as JSON on \
                  stdout; logs go to stderr."
)]
pub struct Cli {
    /// Provider configuration file.
    #[arg(long, global = true, env = "TOOLHUB_CONFIG", default_value = "toolhub.toml")]
    pub config: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every known provider and whether it is enabled.
    Providers,

    /// List available tools.
    List {
        /// Only tools of this provider (enabled or not).
        #[arg(long, short)]
        provider: Option<String>,
    },

    /// Print a tool's definition and parameter schema.
    Describe {
        /// Tool name, e.g. `stripe_list_customers`.
        tool: String,
    },

    /// Invoke a tool and print its result.
    Call {
        /// Tool name.
        tool: String,

        /// Parameters as a JSON object.
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,

        /// Read parameters from a JSON file.
        #[arg(long)]
        params_file: Option<PathBuf>,
    },
}
