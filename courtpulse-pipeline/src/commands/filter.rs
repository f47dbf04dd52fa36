//! Mention filter step: keep only comments naming a tracked player
//!
//! Reads cleaned JSONL, drops every comment mentioning nobody on the roster,
//! and attaches the canonical names of mentioned players to the rest. This
//! is the big volume cut before classification: typically well over 90% of
//! comments never name a player.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::{format_count, format_duration, format_size};
use courtpulse_common::records::Comment;
use courtpulse_common::roster::PlayerTable;
use courtpulse_common::DataPaths;

use crate::pipeline::mentions::{attach_mentions, PLAYER_MENTIONS};
use crate::pipeline::{FilterChain, MentionMatcher};

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Input cleaned JSONL file
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output mention-filtered JSONL file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Process only the first N input lines
    #[arg(long)]
    pub limit: Option<u64>,
}

pub fn run(args: FilterArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.cleaned_file());
    let output = args.output.unwrap_or_else(|| paths.mentions_file());

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let players = PlayerTable::load(&config.roster.players_path())
        .context("Failed to load player roster")?;

    info!("Filter player mentions");
    info!("Input:   {}", input.display());
    info!("Output:  {}", output.display());
    info!("Tracking {} players", players.len());
    if let Some(limit) = args.limit {
        info!("Limit:   {} lines", format_count(limit));
    }

    let input_size = std::fs::metadata(&input)?.len();
    let start = Instant::now();

    let matcher = MentionMatcher::new(&players);
    let mut chain =
        FilterChain::new().with_stage(PLAYER_MENTIONS, move |c| attach_mentions(&matcher, c));
    let mut processed = 0u64;
    let mut malformed = 0u64;

    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(
        File::create(&output).with_context(|| format!("Failed to create {}", output.display()))?,
    );

    for (index, line) in reader.lines().enumerate() {
        if let Some(limit) = args.limit {
            if index as u64 >= limit {
                break;
            }
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        processed += 1;

        let comment: Comment = match serde_json::from_str(&line) {
            Ok(comment) => comment,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };
        if let Some(kept) = chain.process(comment) {
            serde_json::to_writer(&mut writer, &kept)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;

    let elapsed = start.elapsed().as_secs_f64();
    let stats = chain.stats();
    let rejected: u64 = stats.rejected.iter().map(|(_, n)| n).sum();
    let output_size = std::fs::metadata(&output)?.len();
    let throughput = if elapsed > 0.0 {
        processed as f64 / elapsed
    } else {
        0.0
    };

    info!("Processing complete");
    info!("Total processed:      {}", format_count(processed));
    info!("Accepted:             {}", format_count(stats.accepted));
    info!("Rejected:             {}", format_count(rejected));
    if malformed > 0 {
        info!("Malformed:            {}", format_count(malformed));
    }
    if processed > 0 {
        let acceptance_rate = stats.accepted as f64 / processed as f64 * 100.0;
        info!("Acceptance rate:      {:.2}%", acceptance_rate);
    }
    info!("Input size:           {}", format_size(input_size));
    info!("Output size:          {}", format_size(output_size));
    info!("Time elapsed:         {}", format_duration(elapsed));
    info!("Throughput:           {:.0} comments/sec", throughput);

    Ok(())
}
