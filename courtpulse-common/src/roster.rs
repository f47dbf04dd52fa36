//! Player and team roster configuration
//!
//! Loaded once from `config/players.toml` and `config/teams.toml` and passed
//! by reference to the stages that need them. Alias maps are inverted here so
//! lookups downstream are single hash probes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// NBA conference assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conference {
    East,
    West,
}

impl Conference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conference::East => "East",
            Conference::West => "West",
        }
    }
}

/// One tracked player: match aliases plus dashboard metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerEntry {
    /// Lowercase match strings for mention detection
    pub aliases: Vec<String>,
    pub team: String,
    pub conference: Conference,
    /// NBA stats identifier, used to build headshot URLs
    pub player_id: u32,
    pub headshot_url: String,
}

/// Full player roster, keyed by canonical name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerTable {
    /// Aliases too short (or too common as words) for substring matching.
    /// These only count as mentions when they appear as whole words.
    #[serde(default)]
    pub short_aliases: Vec<String>,
    pub players: BTreeMap<String, PlayerEntry>,
}

impl PlayerTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut table: PlayerTable = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid roster file {}: {}", path.display(), e)))?;

        for alias in &mut table.short_aliases {
            *alias = alias.to_lowercase();
        }
        for (name, entry) in &table.players {
            if entry.aliases.is_empty() {
                return Err(Error::Config(format!(
                    "player {:?} in {} has no aliases",
                    name,
                    path.display()
                )));
            }
        }
        Ok(table)
    }

    /// Lowercase alias -> canonical name, covering canonical names themselves.
    pub fn alias_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, entry) in &self.players {
            map.insert(name.to_lowercase(), name.clone());
            for alias in &entry.aliases {
                map.insert(alias.to_lowercase(), name.clone());
            }
        }
        map
    }

    pub fn is_short_alias(&self, alias: &str) -> bool {
        let lower = alias.to_lowercase();
        self.short_aliases.iter().any(|a| a.to_lowercase() == lower)
    }

    pub fn get(&self, canonical: &str) -> Option<&PlayerEntry> {
        self.players.get(canonical)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// One NBA team as it appears in user flair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamEntry {
    pub abbreviation: String,
    pub conference: Conference,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// All thirty teams, keyed by canonical name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamTable {
    pub teams: BTreeMap<String, TeamEntry>,
}

impl TeamTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid roster file {}: {}", path.display(), e)))
    }

    /// Lowercase alias -> canonical name, covering team names and
    /// abbreviations as well as the configured aliases.
    pub fn alias_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (name, entry) in &self.teams {
            map.insert(name.to_lowercase(), name.clone());
            map.insert(entry.abbreviation.to_lowercase(), name.clone());
            for alias in &entry.aliases {
                map.insert(alias.to_lowercase(), name.clone());
            }
        }
        map
    }

    pub fn conference(&self, team: &str) -> Option<Conference> {
        self.teams.get(team).map(|t| t.conference)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}
