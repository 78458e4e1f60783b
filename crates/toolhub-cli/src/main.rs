//! CLI entry point for toolhub.
//!
//! The `toolhub` binary builds the provider registry from the environment
//! and an optional TOML file, then lists, describes or calls tools.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Value, json};
use toolhub_adapters::{
    AdapterError, ErrorKind, HttpTransport, ProcessEnv, ProviderState, Registry, ToolhubConfig,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, LogFormat};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "toolhub failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match ToolhubConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => return Ok(report(&e)),
    };
    debug!(path = %cli.config.display(), "configuration loaded");

    let registry = Registry::from_env(&ProcessEnv, &config, HttpTransport::new());

    match cli.command {
        Commands::Providers => cmd_providers(&registry),
        Commands::List { provider } => cmd_list(&registry, provider.as_deref()),
        Commands::Describe { tool } => cmd_describe(&registry, &tool),
        Commands::Call {
            tool,
            params,
            params_file,
        } => cmd_call(&registry, &tool, params, params_file).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn cmd_providers(registry: &Registry) -> Result<ExitCode> {
    println!("{:<14} {:<16} {:<9} REASON", "PROVIDER", "CATEGORY", "STATE");
    for status in registry.statuses() {
        let (state, reason) = match &status.state {
            ProviderState::Enabled => ("enabled", ""),
            ProviderState::Disabled => ("disabled", "turned off in configuration"),
            ProviderState::Skipped { reason } => ("skipped", reason.as_str()),
        };
        println!(
            "{:<14} {:<16} {:<9} {}",
            status.id,
            status.adapter_type.to_string(),
            state,
            reason
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(registry: &Registry, provider: Option<&str>) -> Result<ExitCode> {
    let mut matched = false;
    for status in registry.statuses() {
        match provider {
            Some(id) if id != status.id => continue,
            // Without a filter only callable tools are listed.
            None if status.state != ProviderState::Enabled => continue,
            _ => {}
        }
        matched = true;
        for tool in &status.tools {
            println!("{:<44} {}", tool.name, tool.description);
        }
    }
    if let Some(id) = provider {
        if !matched {
            bail!("unknown provider `{id}`");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_describe(registry: &Registry, tool: &str) -> Result<ExitCode> {
    let Some(definition) = registry.definition(tool) else {
        bail!("unknown tool `{tool}`");
    };
    println!("{}", serde_json::to_string_pretty(definition)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_call(
    registry: &Registry,
    tool: &str,
    params: Option<String>,
    params_file: Option<std::path::PathBuf>,
) -> Result<ExitCode> {
    let params = read_params(params, params_file)?;
    match registry.call(tool, params).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_params(inline: Option<String>, file: Option<std::path::PathBuf>) -> Result<Value> {
    let raw = match (inline, file) {
        (Some(s), _) => s,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(json!({})),
    };
    let value: Value = serde_json::from_str(&raw).context("parameters are not valid JSON")?;
    if !value.is_object() {
        bail!("parameters must be a JSON object");
    }
    Ok(value)
}

/// Print an adapter error as `{"error": {...}}` and pick the exit code.
fn report(e: &AdapterError) -> ExitCode {
    let out = json!({ "error": e.to_json() });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string())
    );
    ExitCode::from(exit_status(e.kind()))
}

fn exit_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Configuration => 2,
        _ => 1,
    }
}

fn init_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn params_default_to_empty_object() {
        assert_eq!(read_params(None, None).unwrap(), json!({}));
    }

    #[test]
    fn inline_params_must_be_an_object() {
        assert_eq!(
            read_params(Some(r#"{"limit": 5}"#.into()), None).unwrap(),
            json!({"limit": 5})
        );
        assert!(read_params(Some("[1, 2]".into()), None).is_err());
        assert!(read_params(Some("{nope".into()), None).is_err());
    }

    #[test]
    fn params_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"query": "rust"}}"#).unwrap();
        let value = read_params(None, Some(file.path().to_path_buf())).unwrap();
        assert_eq!(value["query"], "rust");
    }

    #[test]
    fn configuration_errors_exit_with_two() {
        assert_eq!(exit_status(ErrorKind::Configuration), 2);
        assert_eq!(exit_status(ErrorKind::Transport), 1);
    }

    #[test]
    fn cli_parses_call_with_params() {
        let cli = Cli::try_parse_from([
            "toolhub",
            "--log-format",
            "json",
            "call",
            "stripe_list_customers",
            "--params",
            "{}",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Call { ref tool, .. } if tool == "stripe_list_customers"));
    }
}
