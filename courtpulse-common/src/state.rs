//! Durable pipeline state
//!
//! Two ledgers survive process restarts: [`PipelineState`] tracks submitted
//! classification batches and token spend, [`DownloadProgress`] tracks
//! per-subreddit download position. Both are JSON files written atomically
//! (temp file in the same directory, then rename) so a crash mid-write never
//! leaves a truncated ledger.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::Result;

/// Batch ledger filename, stored in the batches directory
pub const STATE_FILENAME: &str = "state.json";

/// Download ledger filename, stored in the raw data directory
pub const PROGRESS_FILENAME: &str = ".progress.json";

/// Processing status reported by the classification provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Canceling,
    Ended,
    /// Status string this version does not recognize
    #[serde(other)]
    Unknown,
}

impl BatchStatus {
    pub fn is_ended(&self) -> bool {
        matches!(self, BatchStatus::Ended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Canceling => "canceling",
            BatchStatus::Ended => "ended",
            BatchStatus::Unknown => "unknown",
        }
    }
}

/// Per-outcome request tallies reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

/// One submitted classification batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    /// Ordinal parsed from the request filename (`batch_001.jsonl` -> 1)
    pub batch_num: u32,
    /// Provider-assigned batch identifier
    pub batch_id: String,
    /// Request filename this entry corresponds to
    pub request_file: String,
    pub status: BatchStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results_url: Option<String>,
    #[serde(default)]
    pub request_counts: RequestCounts,
    /// Set once results have been fetched and written locally
    #[serde(default)]
    pub results_downloaded: bool,
}

/// Batch submission ledger plus cumulative token accounting.
///
/// Missing fields deserialize to their defaults, so a ledger written by an
/// older version (or hand-edited down to `{}`) still loads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub estimated_cost_usd: f64,
    #[serde(default)]
    pub batches: Vec<BatchJob>,
}

impl PipelineState {
    /// Load the ledger, returning defaults when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json_atomic(path, self)
    }

    /// True when a request file has already been submitted. Submission keys
    /// on the filename, so re-running submit never duplicates a batch.
    pub fn is_submitted(&self, request_file: &str) -> bool {
        self.batches.iter().any(|b| b.request_file == request_file)
    }

    pub fn find_batch_mut(&mut self, batch_id: &str) -> Option<&mut BatchJob> {
        self.batches.iter_mut().find(|b| b.batch_id == batch_id)
    }
}

/// Resume position for one subreddit mid-download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubredditProgress {
    /// Creation timestamp of the newest comment written so far
    pub last_timestamp: i64,
    /// Comments written so far
    pub count: u64,
}

/// Download ledger: which subreddits are done, and where interrupted ones
/// left off.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DownloadProgress {
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub in_progress: BTreeMap<String, SubredditProgress>,
}

impl DownloadProgress {
    pub fn load(path: &Path) -> Result<Self> {
        load_json_or_default(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json_atomic(path, self)
    }

    pub fn is_completed(&self, subreddit: &str) -> bool {
        self.completed.iter().any(|s| s == subreddit)
    }

    pub fn resume_point(&self, subreddit: &str) -> Option<SubredditProgress> {
        self.in_progress.get(subreddit).copied()
    }

    pub fn record(&mut self, subreddit: &str, last_timestamp: i64, count: u64) {
        self.in_progress.insert(
            subreddit.to_string(),
            SubredditProgress {
                last_timestamp,
                count,
            },
        );
    }

    /// Move a subreddit from in-progress to completed.
    pub fn mark_completed(&mut self, subreddit: &str) {
        self.in_progress.remove(subreddit);
        if !self.is_completed(subreddit) {
            self.completed.push(subreddit.to_string());
        }
    }

    /// Forget a subreddit entirely so the next download starts fresh.
    pub fn clear(&mut self, subreddit: &str) {
        self.in_progress.remove(subreddit);
        self.completed.retain(|s| s != subreddit);
    }
}

fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let data = serde_json::to_vec_pretty(value)?;
    if let Err(e) = std::fs::write(&tmp_path, &data) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    tracing::debug!(path = %path.display(), "ledger saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_batch() -> BatchJob {
        BatchJob {
            batch_num: 1,
            batch_id: "msgbatch_abc123".to_string(),
            request_file: "batch_001.jsonl".to_string(),
            status: BatchStatus::InProgress,
            submitted_at: "2025-01-15T10:30:00Z".parse().unwrap(),
            ended_at: None,
            results_url: None,
            request_counts: RequestCounts::default(),
            results_downloaded: false,
        }
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILENAME);

        let mut state = PipelineState {
            total_input_tokens: 6000,
            total_output_tokens: 500,
            estimated_cost_usd: 0.00425,
            batches: vec![sample_batch()],
        };
        state.batches[0].status = BatchStatus::Ended;
        state.save(&path).unwrap();

        let loaded = PipelineState::load(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_state_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(state, PipelineState::default());
    }

    #[test]
    fn test_state_missing_keys_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILENAME);
        std::fs::write(&path, r#"{"batches": []}"#).unwrap();

        let state = PipelineState::load(&path).unwrap();
        assert_eq!(state.total_input_tokens, 0);
        assert_eq!(state.total_output_tokens, 0);
        assert_eq!(state.estimated_cost_usd, 0.0);
        assert!(state.batches.is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILENAME);
        PipelineState::default().save(&path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![STATE_FILENAME]);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batches").join(STATE_FILENAME);
        PipelineState::default().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_is_submitted_keys_on_filename() {
        let state = PipelineState {
            batches: vec![sample_batch()],
            ..Default::default()
        };
        assert!(state.is_submitted("batch_001.jsonl"));
        assert!(!state.is_submitted("batch_002.jsonl"));
    }

    #[test]
    fn test_batch_status_serde() {
        assert_eq!(
            serde_json::to_string(&BatchStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let s: BatchStatus = serde_json::from_str("\"ended\"").unwrap();
        assert_eq!(s, BatchStatus::Ended);
        // Unrecognized provider statuses must not fail the whole ledger
        let s: BatchStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(s, BatchStatus::Unknown);
    }

    #[test]
    fn test_progress_resume_and_complete() {
        let mut progress = DownloadProgress::default();
        progress.record("lakers", 1717000000, 4200);
        assert_eq!(
            progress.resume_point("lakers"),
            Some(SubredditProgress {
                last_timestamp: 1717000000,
                count: 4200
            })
        );
        assert!(!progress.is_completed("lakers"));

        progress.mark_completed("lakers");
        assert!(progress.is_completed("lakers"));
        assert!(progress.resume_point("lakers").is_none());

        // Completing twice must not duplicate the entry
        progress.mark_completed("lakers");
        assert_eq!(progress.completed.len(), 1);
    }

    #[test]
    fn test_progress_clear_for_forced_redownload() {
        let mut progress = DownloadProgress::default();
        progress.record("nba", 100, 5);
        progress.mark_completed("nba");
        progress.clear("nba");
        assert!(!progress.is_completed("nba"));
        assert!(progress.resume_point("nba").is_none());
    }

    #[test]
    fn test_progress_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROGRESS_FILENAME);

        let mut progress = DownloadProgress::default();
        progress.mark_completed("nba");
        progress.record("warriors", 1718000000, 900);
        progress.save(&path).unwrap();

        let loaded = DownloadProgress::load(&path).unwrap();
        assert_eq!(loaded, progress);
    }
}
