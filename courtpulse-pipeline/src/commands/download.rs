//! Archive download step
//!
//! Walks the configured subreddits sequentially, streaming each one's items
//! to a JSONL file. Progress is checkpointed to the download ledger roughly
//! once per page, so an interrupted run resumes mid-subreddit instead of
//! starting the file over. On a request failure the stream is rebuilt from
//! the last written timestamp after a fixed pause; items already written are
//! never refetched because the resume cursor advances strictly past them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use futures::StreamExt;
use tracing::{error, info, warn};

use courtpulse_common::config::PipelineConfig;
use courtpulse_common::human_format::{format_count, format_duration};
use courtpulse_common::state::DownloadProgress;
use courtpulse_common::DataPaths;

use crate::services::archive::{ArchiveClient, ItemKind};

/// Pause before rebuilding the stream after a failed request
const RETRY_PAUSE_SECS: u64 = 30;

/// Which archive collection to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DownloadKind {
    Comments,
    Posts,
}

impl DownloadKind {
    fn item_kind(self) -> ItemKind {
        match self {
            DownloadKind::Comments => ItemKind::Comments,
            DownloadKind::Posts => ItemKind::Posts,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DownloadKind::Comments => "comments",
            DownloadKind::Posts => "posts",
        }
    }
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Download only this subreddit (for testing)
    #[arg(long)]
    pub subreddit: Option<String>,

    /// Ignore recorded progress and start fresh
    #[arg(long)]
    pub force: bool,

    /// Archive collection to download
    #[arg(long, value_enum, default_value_t = DownloadKind::Comments)]
    pub kind: DownloadKind,

    /// Start of the date range (default: season start)
    #[arg(long)]
    pub after: Option<NaiveDate>,

    /// End of the date range (default: season end)
    #[arg(long)]
    pub before: Option<NaiveDate>,
}

/// Per-subreddit outcome of one session, for the closing summary.
struct SessionStat {
    subreddit: String,
    count: u64,
    duration_secs: f64,
}

/// Ledger key for one download target. Comments keep the bare subreddit
/// name; posts are namespaced so the two collections track independently.
fn ledger_key(kind: DownloadKind, subreddit: &str) -> String {
    match kind {
        DownloadKind::Comments => subreddit.to_string(),
        DownloadKind::Posts => format!("{}/posts", subreddit),
    }
}

fn date_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0).expect("valid time").and_utc().timestamp()
}

pub async fn run(args: DownloadArgs, config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let raw_dir = paths.raw_dir();
    std::fs::create_dir_all(&raw_dir)
        .with_context(|| format!("Failed to create {}", raw_dir.display()))?;
    let progress_path = paths.progress_file();

    let configured = config.subreddits();
    let targets = match &args.subreddit {
        Some(name) => {
            let name = name.to_lowercase();
            if !configured.iter().any(|s| s == &name) {
                warn!(
                    "'{}' is not a configured subreddit. Proceeding anyway.",
                    name
                );
            }
            vec![name]
        }
        None => configured,
    };

    let mut progress = if args.force {
        info!("Force mode: ignoring previous progress");
        if let Some(name) = &args.subreddit {
            // Single-subreddit force keeps the rest of the ledger intact
            let mut loaded = DownloadProgress::load(&progress_path)?;
            loaded.clear(&ledger_key(args.kind, &name.to_lowercase()));
            loaded
        } else {
            DownloadProgress::default()
        }
    } else {
        DownloadProgress::load(&progress_path)?
    };

    let start_date = args.after.unwrap_or(config.season.start);
    let end_date = args.before.unwrap_or(config.season.end);
    let start_ts = date_epoch(start_date);
    let end_ts = date_epoch(end_date);

    info!("Archive download ({})", args.kind.label());
    info!("Date range: {} to {}", start_date, end_date);
    info!("Subreddits to process: {}", targets.len());
    info!("Output dir: {}", raw_dir.display());
    if !args.force {
        info!("Already completed: {}", progress.completed.len());
    }

    let client = ArchiveClient::new(&config.archive)?;
    let session_start = Instant::now();
    let mut session: Vec<SessionStat> = Vec::new();

    for subreddit in &targets {
        let key = ledger_key(args.kind, subreddit);
        if progress.is_completed(&key) {
            info!("Skipping {} (already complete)", subreddit);
            continue;
        }

        let output_path = match args.kind {
            DownloadKind::Comments => paths.raw_comments_file(subreddit),
            DownloadKind::Posts => paths.raw_posts_file(subreddit),
        };

        let sub_start = Instant::now();
        let downloaded = match download_target(
            &client,
            args.kind,
            subreddit,
            &key,
            &output_path,
            start_ts,
            end_ts,
            config.archive.page_size,
            &mut progress,
            &progress_path,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                error!("Failed on {}: {}", subreddit, e);
                return Err(e);
            }
        };
        let sub_elapsed = sub_start.elapsed().as_secs_f64();

        progress.mark_completed(&key);
        progress.save(&progress_path)?;

        let throughput = if sub_elapsed > 0.0 {
            downloaded as f64 / sub_elapsed
        } else {
            0.0
        };
        info!(
            "Completed {}: {} {} in {} ({:.1} {}/sec)",
            subreddit,
            format_count(downloaded),
            args.kind.label(),
            format_duration(sub_elapsed),
            throughput,
            args.kind.label()
        );
        session.push(SessionStat {
            subreddit: subreddit.clone(),
            count: downloaded,
            duration_secs: sub_elapsed,
        });
    }

    let session_elapsed = session_start.elapsed().as_secs_f64();
    let total: u64 = session.iter().map(|s| s.count).sum();
    let total_duration: f64 = session.iter().map(|s| s.duration_secs).sum();
    let overall = if total_duration > 0.0 {
        total as f64 / total_duration
    } else {
        0.0
    };

    info!("Download complete");
    info!(
        "This session: {} subreddits, {} {}",
        session.len(),
        format_count(total),
        args.kind.label()
    );
    info!(
        "Total time: {} (avg {:.1} {}/sec)",
        format_duration(session_elapsed),
        overall,
        args.kind.label()
    );
    session.sort_by(|a, b| b.count.cmp(&a.count));
    for stat in &session {
        let throughput = if stat.duration_secs > 0.0 {
            stat.count as f64 / stat.duration_secs
        } else {
            0.0
        };
        info!(
            "  {}: {} {} in {} ({:.1}/sec)",
            stat.subreddit,
            format_count(stat.count),
            args.kind.label(),
            format_duration(stat.duration_secs),
            throughput
        );
    }

    Ok(())
}

/// Download one subreddit's items in `[start_ts, end_ts)`, resuming from the
/// ledger when a prior run was interrupted. Returns the number of items
/// written this session.
#[allow(clippy::too_many_arguments)]
async fn download_target(
    client: &ArchiveClient,
    kind: DownloadKind,
    subreddit: &str,
    key: &str,
    output_path: &Path,
    start_ts: i64,
    end_ts: i64,
    page_size: u32,
    progress: &mut DownloadProgress,
    progress_path: &Path,
) -> Result<u64> {
    let resume = progress.resume_point(key);

    // Creation time of the newest item written; the stream always starts
    // one second past it so nothing already on disk is fetched again.
    let mut last_timestamp;
    let mut total;
    let file = match resume {
        Some(point) => {
            info!(
                "Resuming {} from {} ({} {} so far)",
                subreddit,
                point.last_timestamp,
                format_count(point.count),
                kind.label()
            );
            last_timestamp = point.last_timestamp;
            total = point.count;
            File::options().append(true).create(true).open(output_path)
        }
        None => {
            info!("Starting {}...", subreddit);
            last_timestamp = start_ts - 1;
            total = 0;
            File::create(output_path)
        }
    }
    .with_context(|| format!("Failed to open {}", output_path.display()))?;

    let started_at = total;
    let progress_every = u64::from(page_size) * 10;
    let checkpoint_every = u64::from(page_size);
    let mut writer = BufWriter::new(file);

    'stream: loop {
        let items = client.items(kind.item_kind(), subreddit, last_timestamp + 1, end_ts);
        tokio::pin!(items);

        while let Some(item) = items.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    warn!("Request failed: {}. Retrying in {}s...", e, RETRY_PAUSE_SECS);
                    writer.flush()?;
                    progress.record(key, last_timestamp, total);
                    progress.save(progress_path)?;
                    tokio::time::sleep(Duration::from_secs(RETRY_PAUSE_SECS)).await;
                    continue 'stream;
                }
            };

            serde_json::to_writer(&mut writer, &item)?;
            writer.write_all(b"\n")?;
            total += 1;
            if let Some(ts) = item.get("created_utc").and_then(|v| v.as_i64()) {
                last_timestamp = ts;
            }

            if total % progress_every == 0 {
                let day = chrono::DateTime::from_timestamp(last_timestamp, 0)
                    .map(|dt| dt.date_naive().to_string())
                    .unwrap_or_else(|| last_timestamp.to_string());
                info!(
                    "  Progress: {} {} (up to {})",
                    format_count(total),
                    kind.label(),
                    day
                );
            }
            if total % checkpoint_every == 0 {
                writer.flush()?;
                progress.record(key, last_timestamp, total);
                progress.save(progress_path)?;
            }
        }
        break;
    }
    writer.flush()?;

    let downloaded = total - started_at;
    if downloaded == 0 {
        info!("  No {} found after {}", kind.label(), last_timestamp + 1);
    }
    Ok(downloaded)
}
