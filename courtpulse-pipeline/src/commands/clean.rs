//! Clean step: validate bodies and project raw comments onto kept fields
//!
//! Streams raw archive JSONL line by line. Parsing into [`Comment`] drops
//! the ~50 unused archive fields; the filter chain then rejects deleted and
//! empty bodies. Input files run to tens of gigabytes, so nothing is held
//! in memory beyond the current line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use courtpulse_common::human_format::{format_count, format_duration, format_size};
use courtpulse_common::records::Comment;
use courtpulse_common::DataPaths;

use crate::pipeline::stages::{valid_body, VALID_BODY};
use crate::pipeline::FilterChain;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Input raw JSONL file (default: the primary subreddit download)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output cleaned JSONL file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Process only the first N input lines
    #[arg(long)]
    pub limit: Option<u64>,
}

pub fn run(args: CleanArgs, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.raw_comments_file("nba"));
    let output = args.output.unwrap_or_else(|| paths.cleaned_file());

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    info!("Clean raw comments");
    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());
    if let Some(limit) = args.limit {
        info!("Limit:  {} lines", format_count(limit));
    }

    let input_size = std::fs::metadata(&input)?.len();
    let start = Instant::now();

    let mut chain = FilterChain::new().with_stage(VALID_BODY, valid_body);
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
    let rejected_body: u64 = stats.rejected.iter().map(|(_, n)| n).sum();
    let output_size = std::fs::metadata(&output)?.len();
    let size_reduction = if input_size > 0 {
        (1.0 - output_size as f64 / input_size as f64) * 100.0
    } else {
        0.0
    };
    let throughput = if elapsed > 0.0 {
        processed as f64 / elapsed
    } else {
        0.0
    };

    info!("Processing complete");
    info!("Total processed:      {}", format_count(processed));
    info!("Accepted:             {}", format_count(stats.accepted));
    info!("Rejected (body):      {}", format_count(rejected_body));
    info!("Rejected (malformed): {}", format_count(malformed));
    if processed > 0 {
        let acceptance_rate = stats.accepted as f64 / processed as f64 * 100.0;
        info!("Acceptance rate:      {:.2}%", acceptance_rate);
    }
    info!("Input size:           {}", format_size(input_size));
    info!("Output size:          {}", format_size(output_size));
    info!("Size reduction:       {:.1}%", size_reduction);
    info!("Time elapsed:         {}", format_duration(elapsed));
    info!("Throughput:           {:.0} comments/sec", throughput);

    Ok(())
}
