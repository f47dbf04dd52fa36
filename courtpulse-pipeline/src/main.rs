//! CourtPulse pipeline - command-line entry point
//!
//! One binary, one subcommand per pipeline stage, run in order:
//! download -> clean -> filter -> prepare -> submit -> collect ->
//! aggregate -> export. Every stage reads files the previous stage wrote,
//! so any stage can be rerun in isolation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtpulse_common::config::{resolve_root_folder, PipelineConfig};
use courtpulse_common::DataPaths;
use courtpulse_pipeline::commands;

/// Command-line arguments for courtpulse
#[derive(Parser, Debug)]
#[command(name = "courtpulse")]
#[command(about = "NBA comment sentiment pipeline")]
#[command(version)]
struct Cli {
    /// Data root folder (overrides COURTPULSE_ROOT and the config file)
    #[arg(short, long, global = true)]
    root_folder: Option<String>,

    /// Config file path (default: ./courtpulse.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download archived comments or posts for the configured subreddits
    Download(commands::download::DownloadArgs),
    /// Drop unusable comments and project the fields later stages read
    Clean(commands::clean::CleanArgs),
    /// Keep only comments that mention a tracked player
    Filter(commands::filter::FilterArgs),
    /// Split filtered comments into classification request files
    Prepare(commands::prepare::PrepareArgs),
    /// Submit prepared request files to the classification service
    Submit(commands::submit::SubmitArgs),
    /// Poll batches, download results, and build the classified output
    Collect(commands::collect::CollectArgs),
    /// Aggregate classified comments into the dashboard JSON document
    Aggregate(commands::aggregate::AggregateArgs),
    /// Export the bar race CSV from the aggregates document
    Export(commands::export::ExportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtpulse_pipeline=info,courtpulse_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let root = resolve_root_folder(cli.root_folder.as_deref(), &config);
    let paths = DataPaths::new(&root);
    info!("Data root: {}", root.display());

    match cli.command {
        Command::Download(args) => commands::download::run(args, &config, &paths).await,
        Command::Clean(args) => commands::clean::run(args, &paths),
        Command::Filter(args) => commands::filter::run(args, &config, &paths),
        Command::Prepare(args) => commands::prepare::run(args, &config, &paths),
        Command::Submit(args) => commands::submit::run(args, &config, &paths).await,
        Command::Collect(args) => commands::collect::run(args, &config, &paths).await,
        Command::Aggregate(args) => commands::aggregate::run(args, &config, &paths),
        Command::Export(args) => commands::export::run(args, &paths),
    }
}
