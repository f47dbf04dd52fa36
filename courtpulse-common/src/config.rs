//! Configuration loading and root folder resolution

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{Error, Result};

/// Environment variable naming the data root folder
pub const ROOT_ENV_VAR: &str = "COURTPULSE_ROOT";

/// Config filename searched in the working directory and the user config dir
pub const CONFIG_FILENAME: &str = "courtpulse.toml";

/// Subreddits covered by a full-season download: the league subreddit first
/// (largest volume, shows progress early), then the thirty team subreddits
/// grouped by division.
pub const TARGET_SUBREDDITS: &[&str] = &[
    "nba",
    // Atlantic
    "bostonceltics",
    "gonets",
    "nyknicks",
    "sixers",
    "torontoraptors",
    // Central
    "chicagobulls",
    "clevelandcavs",
    "detroitpistons",
    "pacers",
    "mkebucks",
    // Southeast
    "atlantahawks",
    "charlottehornets",
    "heat",
    "orlandomagic",
    "washingtonwizards",
    // Northwest
    "denvernuggets",
    "timberwolves",
    "thunder",
    "ripcity",
    "utahjazz",
    // Pacific
    "warriors",
    "laclippers",
    "lakers",
    "suns",
    "kings",
    // Southwest
    "mavericks",
    "rockets",
    "memphisgrizzlies",
    "nolapelicans",
    "nbaspurs",
];

/// Comment archive client settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_url: String,
    /// Items requested per page (server maximum is 100)
    pub page_size: u32,
    /// Fixed pause between page requests, milliseconds. Zero disables it.
    pub request_delay_ms: u64,
    /// Remaining-quota threshold below which we wait out the rate window
    pub rate_limit_buffer: u64,
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://arctic-shift.photon-reddit.com".to_string(),
            page_size: 100,
            request_delay_ms: 500,
            rate_limit_buffer: 10,
            timeout_secs: 60,
        }
    }
}

/// Batch classification service settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Classification requests per prepared batch file
    pub requests_per_batch: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-haiku-4-5-20251001".to_string(),
            max_tokens: 50,
            temperature: 0.0,
            requests_per_batch: 100_000,
        }
    }
}

/// Locations of the player and team roster tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub players_file: String,
    pub teams_file: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            players_file: "config/players.toml".to_string(),
            teams_file: "config/teams.toml".to_string(),
        }
    }
}

impl RosterConfig {
    pub fn players_path(&self) -> PathBuf {
        PathBuf::from(&self.players_file)
    }

    pub fn teams_path(&self) -> PathBuf {
        PathBuf::from(&self.teams_file)
    }
}

/// Season window bounding a full download, inclusive of both dates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            label: "2024-25".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 10, 1).expect("valid date"),
            end: NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date"),
        }
    }
}

impl SeasonConfig {
    /// Season start as epoch seconds (UTC midnight).
    pub fn start_epoch(&self) -> i64 {
        self.start
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
            .and_utc()
            .timestamp()
    }

    /// Season end as epoch seconds (UTC midnight).
    pub fn end_epoch(&self) -> i64 {
        self.end
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
            .and_utc()
            .timestamp()
    }
}

/// Top-level configuration, all fields optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Data root folder; overridden by CLI flag and environment variable
    pub root_folder: Option<String>,
    /// Subreddit override; defaults to [`TARGET_SUBREDDITS`]
    pub subreddits: Option<Vec<String>>,
    pub archive: ArchiveConfig,
    pub classifier: ClassifierConfig,
    pub roster: RosterConfig,
    pub season: SeasonConfig,
}

impl PipelineConfig {
    /// Load configuration following the search order:
    /// 1. Explicit path (must exist)
    /// 2. `courtpulse.toml` in the working directory
    /// 3. `courtpulse/config.toml` in the user config directory
    /// 4. Compiled defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let local = PathBuf::from(CONFIG_FILENAME);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(user_config) =
            dirs::config_dir().map(|d| d.join("courtpulse").join("config.toml"))
        {
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Subreddits to download, honoring the config override.
    pub fn subreddits(&self) -> Vec<String> {
        match &self.subreddits {
            Some(list) => list.clone(),
            None => TARGET_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Resolve the data root folder by priority:
/// 1. Command-line argument (highest priority)
/// 2. `COURTPULSE_ROOT` environment variable
/// 3. `root_folder` key in the config file
/// 4. `./data` (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &PipelineConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return PathBuf::from(path);
    }

    PathBuf::from("./data")
}
