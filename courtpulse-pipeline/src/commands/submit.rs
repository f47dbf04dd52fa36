//! Submit step: send prepared request files to the classification service
//!
//! Submission keys on the request filename in the batch ledger, so rerunning
//! after an interruption picks up exactly the files that were never
//! submitted. The ledger is saved after every successful submission.
//! `--dry-run` validates the pending files and prints a cost estimate
//! without touching the API.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::{error, info};

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::format_count;
use courtpulse_common::state::{BatchJob, PipelineState};
use courtpulse_common::DataPaths;

use crate::batch::files::{
    discover_request_files, extract_batch_num, read_request_file, validate_request_file,
};
use crate::batch::requests::{
    estimate_batch_cost, AVG_INPUT_TOKENS, INPUT_COST_PER_MTOK, OUTPUT_COST_PER_MTOK,
};
use crate::services::classifier::ClassifierClient;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Validate files and estimate cost without making API calls
    #[arg(long)]
    pub dry_run: bool,

    /// Submit only the first N pending batches
    #[arg(long, value_name = "N")]
    pub batches: Option<usize>,

    /// Directory containing request files
    #[arg(long)]
    pub requests_dir: Option<PathBuf>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub async fn run(args: SubmitArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let requests_dir = args.requests_dir.unwrap_or_else(|| paths.requests_dir());
    let state_path = paths.state_file();

    let files = discover_request_files(&requests_dir)?;
    if files.is_empty() {
        bail!("No request files found in {}", requests_dir.display());
    }

    info!("Submit classification batches");
    info!("Requests dir: {}", requests_dir.display());
    info!("State file:   {}", state_path.display());
    info!("Found:        {} request file(s)", files.len());

    let mut state = PipelineState::load(&state_path)?;
    if !state.batches.is_empty() {
        info!(
            "Resuming: {} batch(es) already submitted",
            state.batches.len()
        );
    }

    if args.dry_run {
        dry_run(&files, &state, config)
    } else {
        submit_pending(&files, &mut state, &state_path, config, args.batches).await
    }
}

/// Validate pending files and report what a submission would cost.
fn dry_run(files: &[PathBuf], state: &PipelineState, config: &PipelineConfig) -> Result<()> {
    info!("DRY RUN MODE - no API calls will be made");

    let mut total_requests = 0u64;
    let mut total_cost = 0.0;
    let mut pending = 0usize;
    let mut skipped = 0usize;

    for path in files {
        let filename = file_name(path);
        if state.is_submitted(&filename) {
            skipped += 1;
            continue;
        }

        let request_count = validate_request_file(path)
            .with_context(|| format!("Invalid request file {}", filename))?;
        let estimated = estimate_batch_cost(request_count, config.classifier.max_tokens);
        info!(
            "  {}: {} requests, ~${:.2}",
            filename,
            format_count(request_count),
            estimated
        );

        total_requests += request_count;
        total_cost += estimated;
        pending += 1;
    }

    info!("Summary");
    info!("Already submitted:    {} batches", skipped);
    info!("Pending submission:   {} batches", pending);
    info!("Total requests:       {}", format_count(total_requests));
    info!("Estimated cost:       ${:.2}", total_cost);
    info!("Cost calculation assumptions:");
    info!("  - Input tokens/request:  {}", AVG_INPUT_TOKENS);
    info!(
        "  - Output tokens/request: {} (max)",
        config.classifier.max_tokens
    );
    info!("  - Input cost:  ${}/M tokens", INPUT_COST_PER_MTOK);
    info!("  - Output cost: ${}/M tokens", OUTPUT_COST_PER_MTOK);

    Ok(())
}

async fn submit_pending(
    files: &[PathBuf],
    state: &mut PipelineState,
    state_path: &Path,
    config: &PipelineConfig,
    max_batches: Option<usize>,
) -> Result<()> {
    let mut pending: Vec<&PathBuf> = files
        .iter()
        .filter(|path| !state.is_submitted(&file_name(path)))
        .collect();

    if pending.is_empty() {
        info!("No new batches to submit");
        return Ok(());
    }
    if let Some(max) = max_batches {
        pending.truncate(max);
    }

    let client = ClassifierClient::new(&config.classifier)?;
    info!("Submitting {} batch(es)...", pending.len());

    for path in &pending {
        let filename = file_name(path);
        let Some(batch_num) = extract_batch_num(&filename) else {
            bail!("Unexpected request filename: {}", filename);
        };
        let requests = read_request_file(path)?;

        info!(
            "Submitting {} ({} requests)...",
            filename,
            format_count(requests.len() as u64)
        );

        let handle = match client.submit_batch(&requests).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to submit {}: {}", filename, e);
                return Err(e.into());
            }
        };

        info!(
            "  -> batch_id: {}, status: {}",
            handle.id,
            handle.processing_status.as_str()
        );
        state.batches.push(BatchJob {
            batch_num,
            batch_id: handle.id,
            request_file: filename,
            status: handle.processing_status,
            submitted_at: Utc::now(),
            ended_at: handle.ended_at,
            results_url: handle.results_url,
            request_counts: handle.request_counts,
            results_downloaded: false,
        });
        state.save(state_path)?;
    }

    info!("Submitted {} batch(es)", pending.len());
    info!("State saved to: {}", state_path.display());
    Ok(())
}
