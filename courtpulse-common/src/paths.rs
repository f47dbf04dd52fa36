//! Data directory layout
//!
//! Every pipeline step reads and writes under one root folder. All paths are
//! derived through [`DataPaths`] so the layout is defined in exactly one
//! place.

use std::path::{Path, PathBuf};

use crate::state::{PROGRESS_FILENAME, STATE_FILENAME};

pub const RAW_SUBDIR: &str = "raw";
pub const FILTERED_SUBDIR: &str = "filtered";
pub const BATCHES_SUBDIR: &str = "batches";
pub const REQUESTS_SUBDIR: &str = "requests";
pub const RESPONSES_SUBDIR: &str = "responses";
pub const PROCESSED_SUBDIR: &str = "processed";
pub const DASHBOARD_SUBDIR: &str = "dashboard";

/// Resolved data layout under a single root folder.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw archive downloads, one JSONL file per subreddit
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_SUBDIR)
    }

    /// Cleaned and mention-filtered comment files
    pub fn filtered_dir(&self) -> PathBuf {
        self.root.join(FILTERED_SUBDIR)
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.root.join(BATCHES_SUBDIR)
    }

    /// Prepared batch request files awaiting submission
    pub fn requests_dir(&self) -> PathBuf {
        self.batches_dir().join(REQUESTS_SUBDIR)
    }

    /// Downloaded per-batch result files
    pub fn responses_dir(&self) -> PathBuf {
        self.batches_dir().join(RESPONSES_SUBDIR)
    }

    /// Joined classification output
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_SUBDIR)
    }

    /// Precomputed aggregates and chart exports
    pub fn dashboard_dir(&self) -> PathBuf {
        self.root.join(DASHBOARD_SUBDIR)
    }

    pub fn state_file(&self) -> PathBuf {
        self.batches_dir().join(STATE_FILENAME)
    }

    pub fn progress_file(&self) -> PathBuf {
        self.raw_dir().join(PROGRESS_FILENAME)
    }

    pub fn raw_comments_file(&self, subreddit: &str) -> PathBuf {
        self.raw_dir().join(format!("r_{}_comments.jsonl", subreddit))
    }

    pub fn raw_posts_file(&self, subreddit: &str) -> PathBuf {
        self.raw_dir().join(format!("r_{}_posts.jsonl", subreddit))
    }

    /// Default output of the clean step (primary subreddit)
    pub fn cleaned_file(&self) -> PathBuf {
        self.filtered_dir().join("r_nba_cleaned.jsonl")
    }

    /// Default output of the mention filter step
    pub fn mentions_file(&self) -> PathBuf {
        self.filtered_dir().join("r_nba_player_mentions.jsonl")
    }

    pub fn request_file(&self, batch_num: u32) -> PathBuf {
        self.requests_dir().join(format!("batch_{:03}.jsonl", batch_num))
    }

    pub fn results_file(&self, batch_num: u32) -> PathBuf {
        self.responses_dir()
            .join(format!("batch_{:03}_results.jsonl", batch_num))
    }

    pub fn classified_file(&self) -> PathBuf {
        self.processed_dir().join("classified.jsonl")
    }

    pub fn failed_requests_file(&self) -> PathBuf {
        self.batches_dir().join("failed_requests.jsonl")
    }

    pub fn aggregates_file(&self) -> PathBuf {
        self.dashboard_dir().join("aggregates.json")
    }

    pub fn bar_race_file(&self) -> PathBuf {
        self.dashboard_dir().join("bar_race.csv")
    }
}
