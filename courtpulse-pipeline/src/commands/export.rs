//! Export step: aggregates JSON to the bar race CSV

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use courtpulse_common::DataPaths;

use crate::aggregate::bar_race::{compute_cumulative_metrics, pivot_bar_race_wide, write_csv};
use crate::aggregate::AggregateDocument;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Aggregates JSON file (default: dashboard/aggregates.json)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Bar race CSV output (default: dashboard/bar_race.csv)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Number of top players to include
    #[arg(long, default_value_t = 15)]
    pub top_n: usize,

    /// Minimum cumulative comments to qualify for top-N ranking
    #[arg(long, default_value_t = 5000)]
    pub min_ranking_comments: u64,

    /// Minimum cumulative comments for a player's bar to appear
    #[arg(long, default_value_t = 1000)]
    pub min_entry_comments: u64,
}

pub fn run(args: ExportArgs, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.aggregates_file());
    let output = args.output.unwrap_or_else(|| paths.bar_race_file());

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    info!("Bar race CSV export");
    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());
    info!("Top N:  {}", args.top_n);
    info!("Min ranking comments: {}", args.min_ranking_comments);
    info!("Min entry comments:   {}", args.min_entry_comments);

    let reader = BufReader::new(File::open(&input)?);
    let document: AggregateDocument = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    let points = compute_cumulative_metrics(&document.player_temporal);
    let player_count = points
        .iter()
        .map(|p| p.player.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let week_count = points
        .iter()
        .map(|p| p.week)
        .collect::<BTreeSet<_>>()
        .len();
    info!(
        "Computed cumulative metrics: {} players x {} weeks",
        player_count, week_count
    );

    let table = pivot_bar_race_wide(
        &points,
        &document.player_metadata,
        args.top_n,
        args.min_ranking_comments,
        args.min_entry_comments,
    );

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(&output)?);
    write_csv(&table, writer)?;

    info!("Summary");
    info!("Players: {}", table.rows.len());
    info!("Weeks:   {}", table.week_columns.len());
    info!("Output:  {}", output.display());

    Ok(())
}
