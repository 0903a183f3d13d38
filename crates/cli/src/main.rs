//! SEAD entity reconciliation service CLI.
//!
//! This binary loads configuration, wires the reconciliation engine to the
//! authority database, and runs the REST server (spec §1, §6).

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reconcile_cli::build_engine;
use reconcile_core::config::Config;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "sead-reconcile")]
#[command(about = "Entity reconciliation service for the SEAD authority database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reconciliation REST server
    Serve,
    /// Validate a configuration file and print it back out
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Some(Commands::Serve) | None => serve(cli.config.as_deref()).await,
        Some(Commands::CheckConfig) => check_config(cli.config.as_deref()),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("sead_reconcile={level},{}={level}", env!("CARGO_PKG_NAME")))
        .init();
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("sead-reconcile.toml"));
    let config = Config::load(&path).with_context(|| format!("failed to load {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn serve(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    info!(identifier_space = %config.identifier_space, "starting reconciliation server");

    let engine = build_engine(&config)
        .await
        .context("failed to build reconciliation engine")?;

    reconcile_server::run_server(config, engine)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

fn check_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let toml = toml::to_string_pretty(&config).context("failed to serialize configuration")?;
    println!("{toml}");
    Ok(())
}
