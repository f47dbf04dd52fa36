//! Collect step: poll submitted batches, download results, build the output
//!
//! Runs as a loop by default: refresh every pending batch's status, save the
//! ledger, pull down results for batches that just ended, and repeat until
//! nothing is pending or the deadline passes. Only when every batch has ended
//! and every results file is on disk does it join the results against the
//! filtered comments and write the classified output.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::format_count;
use courtpulse_common::records::Comment;
use courtpulse_common::state::PipelineState;
use courtpulse_common::DataPaths;

use crate::batch::calculate_cost;
use crate::batch::files::discover_results_files;
use crate::collect::join_results;
use crate::services::classifier::{BatchResultLine, ClassifierClient, ResultType};

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Seconds between status checks
    #[arg(long, default_value_t = 60, value_name = "N")]
    pub poll_interval: u64,

    /// Maximum wait time in seconds
    #[arg(long, default_value_t = 86_400, value_name = "N")]
    pub max_wait: u64,

    /// Check once, download completed batches, and exit
    #[arg(long)]
    pub no_wait: bool,
}

pub async fn run(args: CollectArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let state_path = paths.state_file();
    let responses_dir = paths.responses_dir();
    let filtered_path = paths.mentions_file();
    let output_path = paths.classified_file();

    info!("Collect batch results");
    info!("State file:    {}", state_path.display());
    info!("Responses dir: {}", responses_dir.display());
    info!("Output file:   {}", output_path.display());

    let mut state = PipelineState::load(&state_path)?;
    if state.batches.is_empty() {
        bail!("No batches found in state. Run submit first.");
    }
    if !filtered_path.exists() {
        bail!(
            "Filtered comments file not found: {}",
            filtered_path.display()
        );
    }
    info!("Found {} batch(es) in state", state.batches.len());

    let client = ClassifierClient::new(&config.classifier)?;

    if args.no_wait {
        info!("Running in --no-wait mode (single check)");
        poll_batch_statuses(&client, &mut state).await;
        state.save(&state_path)?;
        download_ready(&client, &mut state, &state_path, paths).await?;

        let pending = pending_count(&state);
        if pending > 0 {
            info!("{} batch(es) still pending", pending);
        } else {
            info!("All batches completed!");
        }
    } else {
        info!(
            "Polling every {}s (max {}s)...",
            args.poll_interval, args.max_wait
        );
        let completed = poll_until_complete(
            &client,
            &mut state,
            &state_path,
            paths,
            args.poll_interval,
            args.max_wait,
        )
        .await?;
        if !completed {
            warn!("Exiting with pending batches due to timeout");
        }
    }

    // The join only makes sense over the complete result set.
    let pending = pending_count(&state);
    let not_downloaded = state
        .batches
        .iter()
        .filter(|b| !b.results_downloaded)
        .count();
    if pending > 0 || not_downloaded > 0 {
        info!(
            "Cannot build final output: {} pending, {} not downloaded",
            pending, not_downloaded
        );
        return Ok(());
    }

    build_classified_output(&mut state, &state_path, paths)
}

fn pending_count(state: &PipelineState) -> usize {
    state
        .batches
        .iter()
        .filter(|b| !b.status.is_ended())
        .count()
}

/// Refresh status for every batch that has not ended yet.
///
/// A failed status check is logged and left for the next pass rather than
/// aborting the loop.
async fn poll_batch_statuses(client: &ClassifierClient, state: &mut PipelineState) {
    for batch in state.batches.iter_mut().filter(|b| !b.status.is_ended()) {
        match client.batch_status(&batch.batch_id).await {
            Ok(handle) => {
                batch.status = handle.processing_status;
                batch.request_counts = handle.request_counts;
                batch.ended_at = handle.ended_at;
                batch.results_url = handle.results_url;

                if batch.status.is_ended() {
                    info!(
                        "Batch {} completed: {} succeeded, {} errored",
                        batch.batch_num,
                        batch.request_counts.succeeded,
                        batch.request_counts.errored
                    );
                } else {
                    debug!("Batch {}: {}", batch.batch_num, batch.status.as_str());
                }
            }
            Err(e) => error!("Failed to get status for batch {}: {}", batch.batch_id, e),
        }
    }
}

/// Download results for ended batches that have not been fetched yet.
///
/// The downloaded flag is saved after each batch, so an interrupted run
/// never refetches what is already on disk.
async fn download_ready(
    client: &ClassifierClient,
    state: &mut PipelineState,
    state_path: &Path,
    paths: &DataPaths,
) -> Result<()> {
    let responses_dir = paths.responses_dir();

    for index in 0..state.batches.len() {
        let (batch_id, batch_num) = {
            let batch = &state.batches[index];
            if !batch.status.is_ended() || batch.results_downloaded {
                continue;
            }
            (batch.batch_id.clone(), batch.batch_num)
        };

        info!("Downloading results for batch {}...", batch_num);
        let results = match client.download_results(&batch_id).await {
            Ok(results) => results,
            Err(e) => {
                error!("Failed to download batch {}: {}", batch_num, e);
                continue;
            }
        };

        std::fs::create_dir_all(&responses_dir)?;
        let results_path = paths.results_file(batch_num);
        write_jsonl(&results_path, &results)
            .with_context(|| format!("Failed to write {}", results_path.display()))?;

        let succeeded = results
            .iter()
            .filter(|r| r.result_type == ResultType::Succeeded)
            .count();
        info!(
            "  -> Saved {} results ({} succeeded, {} failed)",
            results.len(),
            succeeded,
            results.len() - succeeded
        );

        state.batches[index].results_downloaded = true;
        state.save(state_path)?;
    }

    Ok(())
}

/// Poll until every batch ends or the deadline passes, downloading results
/// as batches finish. Returns false on timeout with work still pending.
async fn poll_until_complete(
    client: &ClassifierClient,
    state: &mut PipelineState,
    state_path: &Path,
    paths: &DataPaths,
    poll_interval: u64,
    max_wait: u64,
) -> Result<bool> {
    let started = Instant::now();

    loop {
        poll_batch_statuses(client, state).await;
        state.save(state_path)?;
        download_ready(client, state, state_path, paths).await?;

        let pending = pending_count(state);
        if pending == 0 {
            info!("All batches completed!");
            return Ok(true);
        }

        let elapsed = started.elapsed().as_secs_f64();
        if elapsed >= max_wait as f64 {
            warn!(
                "Timeout after {:.0}s with {} batches pending",
                elapsed, pending
            );
            return Ok(false);
        }

        let remaining = max_wait as f64 - elapsed;
        let wait = (poll_interval as f64).min(remaining);
        info!(
            "Waiting {:.0}s... ({} batches pending, {:.0}s remaining)",
            wait, pending, remaining
        );
        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
    }
}

/// Join downloaded results against the filtered comments and write the
/// classified output plus a failures file.
///
/// Token totals in the ledger are rebuilt from the result files on every
/// run, not accumulated, so a rerun stays accurate.
fn build_classified_output(
    state: &mut PipelineState,
    state_path: &Path,
    paths: &DataPaths,
) -> Result<()> {
    let responses_dir = paths.responses_dir();
    let output_path = paths.classified_file();

    let results_files = discover_results_files(&responses_dir)?;
    if results_files.is_empty() {
        bail!("No results files found in {}", responses_dir.display());
    }

    info!("Building classified output...");
    info!("Loading results from {} files...", results_files.len());

    let mut results = Vec::new();
    for path in &results_files {
        read_results_file(path, &mut results)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let filtered_path = paths.mentions_file();
    info!("Loading comments from {}...", filtered_path.display());
    let comments = load_comment_map(&filtered_path)
        .with_context(|| format!("Failed to read {}", filtered_path.display()))?;

    info!("Joining results with comments...");
    let outcome = join_results(results, &comments);

    info!(
        "Loaded {} successful results",
        format_count(outcome.succeeded)
    );
    if !outcome.failed.is_empty() {
        warn!("Found {} failed requests", outcome.failed.len());
    }
    if outcome.dropped > 0 {
        warn!(
            "Join dropped {} results ({:.1}% - comments may be missing from filtered file)",
            outcome.dropped,
            outcome.drop_rate_pct()
        );
    }

    std::fs::create_dir_all(paths.processed_dir())?;
    write_jsonl(&output_path, &outcome.classified)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(
        "Wrote {} rows to {}",
        format_count(outcome.classified.len() as u64),
        output_path.display()
    );

    if !outcome.failed.is_empty() {
        let failed_path = paths.failed_requests_file();
        write_jsonl(&failed_path, &outcome.failed)
            .with_context(|| format!("Failed to write {}", failed_path.display()))?;
        warn!(
            "Wrote {} failed requests to {}",
            outcome.failed.len(),
            failed_path.display()
        );
    }

    state.total_input_tokens = outcome.total_input_tokens;
    state.total_output_tokens = outcome.total_output_tokens;
    state.estimated_cost_usd =
        calculate_cost(outcome.total_input_tokens, outcome.total_output_tokens);
    state.save(state_path)?;

    info!("Summary");
    info!(
        "Total input tokens:  {}",
        format_count(state.total_input_tokens)
    );
    info!(
        "Total output tokens: {}",
        format_count(state.total_output_tokens)
    );
    info!("Estimated cost:      ${:.2}", state.estimated_cost_usd);

    Ok(())
}

fn read_results_file(path: &Path, into: &mut Vec<BatchResultLine>) -> Result<()> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result: BatchResultLine =
            serde_json::from_str(&line).with_context(|| format!("line {}", index + 1))?;
        into.push(result);
    }

    Ok(())
}

fn load_comment_map(path: &Path) -> Result<HashMap<String, Comment>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut map = HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let comment: Comment =
            serde_json::from_str(&line).with_context(|| format!("line {}", index + 1))?;
        map.insert(comment.id.clone(), comment);
    }

    Ok(map)
}

fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_comment_map_keyed_by_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mentions.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"c1","body":"Luka is unreal","created_utc":1728950400,"mentioned_players":["Luka Doncic"]}"#,
                "\n\n",
                r#"{"id":"c2","body":"trade him","created_utc":1728950500,"mentioned_players":["Luka Doncic"]}"#,
                "\n",
            ),
        )
        .unwrap();

        let map = load_comment_map(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["c1"].body.as_deref(), Some("Luka is unreal"));
        assert_eq!(map["c2"].created_utc, 1728950500);
    }

    #[test]
    fn test_results_file_roundtrip_keeps_failures() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch_001_results.jsonl");

        let lines = vec![
            BatchResultLine {
                custom_id: "c1".to_string(),
                result_type: ResultType::Succeeded,
                content: Some(r#"{"s": 1, "c": 0.9}"#.to_string()),
                error: None,
                input_tokens: 60,
                output_tokens: 8,
            },
            BatchResultLine {
                custom_id: "c2".to_string(),
                result_type: ResultType::Errored,
                content: None,
                error: Some("overloaded".to_string()),
                input_tokens: 0,
                output_tokens: 0,
            },
        ];
        write_jsonl(&path, &lines).unwrap();

        let mut read_back = Vec::new();
        read_results_file(&path, &mut read_back).unwrap();
        assert_eq!(read_back, lines);
    }
}
