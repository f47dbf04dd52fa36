//! Aggregate step: classified comments to the dashboard JSON document

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::format_count;
use courtpulse_common::records::ClassifiedComment;
use courtpulse_common::roster::{PlayerTable, TeamTable};
use courtpulse_common::DataPaths;

use crate::aggregate::build_aggregates;

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Classified comments file (default: processed/classified.jsonl)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Aggregates JSON output (default: dashboard/aggregates.json)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: AggregateArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.classified_file());
    let output = args.output.unwrap_or_else(|| paths.aggregates_file());

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    info!("Sentiment aggregation");
    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());

    let players =
        PlayerTable::load(&config.roster.players_path()).context("Failed to load player roster")?;
    let teams =
        TeamTable::load(&config.roster.teams_path()).context("Failed to load team table")?;

    let (comments, malformed) = read_classified(&input)?;
    if malformed > 0 {
        warn!("Skipped {} malformed lines in {}", malformed, input.display());
    }

    let document = build_aggregates(&comments, malformed, &players, &teams, &config.season.label);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(&output)?);
    serde_json::to_writer_pretty(writer, &document)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote aggregates to {}", output.display());

    let meta = &document.metadata;
    info!("Summary");
    info!("Total comments:      {}", format_count(meta.total_comments));
    info!("Usable comments:     {}", format_count(meta.usable_comments));
    info!("Excluded (errors):   {}", format_count(meta.excluded_comments));
    info!("Attributed:          {}", format_count(meta.attributed_comments));
    info!("Players:             {}", meta.player_count);
    info!("Teams:               {}", meta.team_count);
    info!("Weeks:               {}", meta.week_count);

    Ok(())
}

/// Read the classified JSONL file, counting lines that fail to parse
/// instead of aborting on them.
fn read_classified(path: &Path) -> Result<(Vec<ClassifiedComment>, u64)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut comments = Vec::new();
    let mut malformed = 0u64;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ClassifiedComment>(&line) {
            Ok(comment) => comments.push(comment),
            Err(_) => malformed += 1,
        }
    }

    Ok((comments, malformed))
}
