//! Prepare step: turn filtered comments into batch request files
//!
//! Each accepted comment becomes one classification request line; output
//! rolls over to a new `batch_NNN.jsonl` file at the configured requests
//! per batch.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::{format_count, format_duration};
use courtpulse_common::records::Comment;
use courtpulse_common::DataPaths;

use crate::batch::format_batch_request;

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Input filtered JSONL file
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory for batch request files
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Prepare only the first N comments
    #[arg(long)]
    pub limit: Option<u64>,
}

/// Writes request lines, rolling to a new numbered file when the current
/// one reaches capacity.
struct RollingWriter {
    dir: PathBuf,
    capacity: usize,
    current: Option<BufWriter<File>>,
    in_current: usize,
    batches: u32,
}

impl RollingWriter {
    fn new(dir: PathBuf, capacity: usize) -> Self {
        Self {
            dir,
            capacity,
            current: None,
            in_current: 0,
            batches: 0,
        }
    }

    fn write_line(&mut self, value: &impl serde::Serialize) -> Result<()> {
        if self.current.is_none() || self.in_current >= self.capacity {
            self.roll()?;
        }
        let writer = self.current.as_mut().expect("writer opened by roll");
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        self.in_current += 1;
        Ok(())
    }

    fn roll(&mut self) -> Result<()> {
        self.finish()?;
        self.batches += 1;
        let path = self.dir.join(format!("batch_{:03}.jsonl", self.batches));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.current = Some(BufWriter::new(file));
        self.in_current = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

pub fn run(args: PrepareArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let input = args.input.unwrap_or_else(|| paths.mentions_file());
    let output_dir = args.output.unwrap_or_else(|| paths.requests_dir());
    let per_batch = config.classifier.requests_per_batch;

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    info!("Prepare batch requests");
    info!("Input:  {}", input.display());
    info!("Output: {}/", output_dir.display());
    info!("Max requests per batch: {}", format_count(per_batch as u64));
    if let Some(limit) = args.limit {
        info!("Limit:  {} comments", format_count(limit));
    }

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let start = Instant::now();
    let mut total = 0u64;
    let mut malformed = 0u64;
    let mut rolling = RollingWriter::new(output_dir, per_batch);

    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    for line in reader.lines() {
        if let Some(limit) = args.limit {
            if total >= limit {
                break;
            }
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let comment: Comment = match serde_json::from_str(&line) {
            Ok(comment) => comment,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };
        rolling.write_line(&format_batch_request(&comment, &config.classifier))?;
        total += 1;
    }
    rolling.finish()?;

    let elapsed = start.elapsed().as_secs_f64();
    let throughput = if elapsed > 0.0 {
        total as f64 / elapsed
    } else {
        0.0
    };

    info!("Processing complete");
    info!("Total processed:      {}", format_count(total));
    info!("Batches created:      {}", rolling.batches);
    if malformed > 0 {
        info!("Malformed (skipped):  {}", format_count(malformed));
    }
    info!("Time elapsed:         {}", format_duration(elapsed));
    info!("Throughput:           {:.0} comments/sec", throughput);

    Ok(())
}
