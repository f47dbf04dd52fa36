//! Dashboard aggregate document and the grouping pass that builds it

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use courtpulse_common::records::ClassifiedComment;
use courtpulse_common::roster::{Conference, PlayerTable, TeamTable};

use crate::aggregate::attribution::{resolve_player, FlairMatcher};
use crate::aggregate::metrics::{SentimentCounts, SentimentMetrics};
use crate::aggregate::temporal::week_start;

/// One `player_overall` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub attributed_player: String,
    #[serde(flatten)]
    pub metrics: SentimentMetrics,
}

/// One `player_temporal` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerWeekRow {
    pub attributed_player: String,
    pub week: NaiveDate,
    #[serde(flatten)]
    pub metrics: SentimentMetrics,
}

/// One `player_team` row (attributed player crossed with commenter flair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTeamRow {
    pub attributed_player: String,
    pub team: String,
    #[serde(flatten)]
    pub metrics: SentimentMetrics,
}

/// One `team_overall` row (grouped by commenter flair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub team: String,
    pub conference: Option<Conference>,
    #[serde(flatten)]
    pub metrics: SentimentMetrics,
}

/// Dashboard lookups for one attributed player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetadataEntry {
    pub team: String,
    pub conference: Conference,
    pub player_id: u32,
    pub headshot_url: String,
}

/// Run-level counters written alongside the views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetadata {
    pub total_comments: u64,
    pub usable_comments: u64,
    pub excluded_comments: u64,
    pub attributed_comments: u64,
    pub player_count: u64,
    pub team_count: u64,
    pub week_count: u64,
    pub season: String,
    pub generated_at: DateTime<Utc>,
}

/// Everything the dashboard reads, in one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub player_overall: Vec<PlayerRow>,
    pub player_temporal: Vec<PlayerWeekRow>,
    pub player_team: Vec<PlayerTeamRow>,
    pub team_overall: Vec<TeamRow>,
    pub player_metadata: BTreeMap<String, PlayerMetadataEntry>,
    pub metadata: AggregateMetadata,
}

/// Build every aggregation view from classified comments.
///
/// `excluded` counts input lines that never became a usable row (malformed
/// lines in the classified file); it only feeds the metadata block.
///
/// Row order is deterministic: `player_overall` descends by negative rate,
/// the remaining views ascend by their group keys.
pub fn build_aggregates(
    comments: &[ClassifiedComment],
    excluded: u64,
    players: &PlayerTable,
    teams: &TeamTable,
    season: &str,
) -> AggregateDocument {
    let alias_map = players.alias_map();
    let flair = FlairMatcher::new(teams);

    let mut by_player: BTreeMap<String, SentimentCounts> = BTreeMap::new();
    let mut by_player_week: BTreeMap<(String, NaiveDate), SentimentCounts> = BTreeMap::new();
    let mut by_player_team: BTreeMap<(String, String), SentimentCounts> = BTreeMap::new();
    let mut by_team: BTreeMap<String, SentimentCounts> = BTreeMap::new();
    let mut weeks_seen: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut attributed = 0u64;

    for comment in comments {
        let player = resolve_player(
            &comment.mentioned_players,
            comment.sentiment_player.as_deref(),
            &alias_map,
        );
        let team = flair.team_for_flair(comment.author_flair_text.as_deref());
        let week = week_start(comment.created_utc);

        if let Some(week) = week {
            weeks_seen.insert(week);
        }
        if let Some(player) = &player {
            attributed += 1;
            by_player
                .entry(player.clone())
                .or_default()
                .add(comment.sentiment);
            if let Some(week) = week {
                by_player_week
                    .entry((player.clone(), week))
                    .or_default()
                    .add(comment.sentiment);
            }
            if let Some(team) = &team {
                by_player_team
                    .entry((player.clone(), team.clone()))
                    .or_default()
                    .add(comment.sentiment);
            }
        }
        if let Some(team) = &team {
            by_team
                .entry(team.clone())
                .or_default()
                .add(comment.sentiment);
        }
    }

    let mut player_overall: Vec<PlayerRow> = by_player
        .iter()
        .map(|(player, counts)| PlayerRow {
            attributed_player: player.clone(),
            metrics: counts.finish(),
        })
        .collect();
    player_overall.sort_by(|a, b| b.metrics.neg_rate.total_cmp(&a.metrics.neg_rate));

    let player_temporal: Vec<PlayerWeekRow> = by_player_week
        .iter()
        .map(|((player, week), counts)| PlayerWeekRow {
            attributed_player: player.clone(),
            week: *week,
            metrics: counts.finish(),
        })
        .collect();

    let player_team: Vec<PlayerTeamRow> = by_player_team
        .iter()
        .map(|((player, team), counts)| PlayerTeamRow {
            attributed_player: player.clone(),
            team: team.clone(),
            metrics: counts.finish(),
        })
        .collect();

    let team_overall: Vec<TeamRow> = by_team
        .iter()
        .map(|(team, counts)| TeamRow {
            team: team.clone(),
            conference: teams.conference(team),
            metrics: counts.finish(),
        })
        .collect();

    let player_metadata: BTreeMap<String, PlayerMetadataEntry> = by_player
        .keys()
        .filter_map(|player| {
            players.get(player).map(|entry| {
                (
                    player.clone(),
                    PlayerMetadataEntry {
                        team: entry.team.clone(),
                        conference: entry.conference,
                        player_id: entry.player_id,
                        headshot_url: entry.headshot_url.clone(),
                    },
                )
            })
        })
        .collect();

    let usable = comments.len() as u64;
    let metadata = AggregateMetadata {
        total_comments: usable + excluded,
        usable_comments: usable,
        excluded_comments: excluded,
        attributed_comments: attributed,
        player_count: by_player.len() as u64,
        team_count: by_team.len() as u64,
        week_count: weeks_seen.len() as u64,
        season: season.to_string(),
        generated_at: Utc::now(),
    };

    AggregateDocument {
        player_overall,
        player_temporal,
        player_team,
        team_overall,
        player_metadata,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtpulse_common::records::Sentiment;

    const PLAYERS_TOML: &str = r#"
[players."LeBron James"]
aliases = ["lebron", "bron"]
team = "Los Angeles Lakers"
conference = "West"
player_id = 2544
headshot_url = "https://cdn.nba.com/headshots/nba/latest/1040x760/2544.png"

[players."Jayson Tatum"]
aliases = ["tatum"]
team = "Boston Celtics"
conference = "East"
player_id = 1628369
headshot_url = "https://cdn.nba.com/headshots/nba/latest/1040x760/1628369.png"
"#;

    const TEAMS_TOML: &str = r#"
[teams."Los Angeles Lakers"]
abbreviation = "LAL"
conference = "West"
aliases = ["lakers"]

[teams."Boston Celtics"]
abbreviation = "BOS"
conference = "East"
aliases = ["celtics"]
"#;

    fn fixture_tables() -> (PlayerTable, TeamTable) {
        (
            toml::from_str(PLAYERS_TOML).unwrap(),
            toml::from_str(TEAMS_TOML).unwrap(),
        )
    }

    fn comment(
        id: &str,
        mentioned: &[&str],
        sentiment: Sentiment,
        flair: Option<&str>,
        created_utc: i64,
    ) -> ClassifiedComment {
        ClassifiedComment {
            comment_id: id.to_string(),
            body: "fixture".to_string(),
            author: Some("user".to_string()),
            author_flair_text: flair.map(str::to_string),
            author_flair_css_class: None,
            created_utc,
            score: Some(1),
            mentioned_players: mentioned.iter().map(|s| s.to_string()).collect(),
            sentiment,
            confidence: 0.9,
            sentiment_player: None,
            input_tokens: 60,
            output_tokens: 20,
        }
    }

    // Monday 2024-10-07 and Monday 2024-10-14, both midday UTC
    const WEEK1: i64 = 1_728_302_400;
    const WEEK2: i64 = 1_728_907_200;

    #[test]
    fn test_views_and_metadata_from_small_run() {
        let (players, teams) = fixture_tables();
        let comments = vec![
            comment("c1", &["LeBron James"], Sentiment::Neg, Some("Lakers"), WEEK1),
            comment("c2", &["LeBron James"], Sentiment::Neg, Some("Celtics"), WEEK1),
            comment("c3", &["LeBron James"], Sentiment::Pos, None, WEEK2),
            comment("c4", &["Jayson Tatum"], Sentiment::Neu, Some("Celtics"), WEEK2),
            comment("c5", &[], Sentiment::Neg, Some("Lakers"), WEEK1),
        ];

        let doc = build_aggregates(&comments, 2, &players, &teams, "2024-25");

        // player_overall descends by neg_rate: LeBron 2/3, Tatum 0/1
        assert_eq!(doc.player_overall.len(), 2);
        assert_eq!(doc.player_overall[0].attributed_player, "LeBron James");
        assert_eq!(doc.player_overall[0].metrics.neg_rate, 0.6667);
        assert_eq!(doc.player_overall[1].attributed_player, "Jayson Tatum");
        assert_eq!(doc.player_overall[1].metrics.comment_count, 1);

        // temporal rows: LeBron in both weeks, Tatum in week 2
        assert_eq!(doc.player_temporal.len(), 3);
        let lebron_week1 = doc
            .player_temporal
            .iter()
            .find(|r| r.attributed_player == "LeBron James" && r.week.to_string() == "2024-10-07")
            .unwrap();
        assert_eq!(lebron_week1.metrics.neg_count, 2);

        // player_team keeps only rows where both sides resolved
        assert_eq!(doc.player_team.len(), 3);
        let lebron_celtics = doc
            .player_team
            .iter()
            .find(|r| r.attributed_player == "LeBron James" && r.team == "Boston Celtics")
            .unwrap();
        assert_eq!(lebron_celtics.metrics.comment_count, 1);

        // team_overall includes the unattributed c5 and carries conference
        let lakers = doc
            .team_overall
            .iter()
            .find(|r| r.team == "Los Angeles Lakers")
            .unwrap();
        assert_eq!(lakers.metrics.comment_count, 2);
        assert_eq!(lakers.conference, Some(Conference::West));
        let celtics = doc
            .team_overall
            .iter()
            .find(|r| r.team == "Boston Celtics")
            .unwrap();
        assert_eq!(celtics.conference, Some(Conference::East));

        let meta = &doc.metadata;
        assert_eq!(meta.total_comments, 7);
        assert_eq!(meta.usable_comments, 5);
        assert_eq!(meta.excluded_comments, 2);
        assert_eq!(meta.attributed_comments, 4);
        assert_eq!(meta.player_count, 2);
        assert_eq!(meta.team_count, 2);
        assert_eq!(meta.week_count, 2);
        assert_eq!(meta.season, "2024-25");
    }

    #[test]
    fn test_player_metadata_covers_attributed_players_only() {
        let (players, teams) = fixture_tables();
        let comments = vec![
            comment("c1", &["LeBron James"], Sentiment::Neg, None, WEEK1),
            comment("c2", &[], Sentiment::Pos, Some("Celtics"), WEEK1),
        ];

        let doc = build_aggregates(&comments, 0, &players, &teams, "2024-25");

        assert_eq!(doc.player_metadata.len(), 1);
        let lebron = &doc.player_metadata["LeBron James"];
        assert_eq!(lebron.team, "Los Angeles Lakers");
        assert_eq!(lebron.conference, Conference::West);
        assert_eq!(lebron.player_id, 2544);
        assert!(lebron.headshot_url.ends_with("2544.png"));
        assert!(!doc.player_metadata.contains_key("Jayson Tatum"));
    }

    #[test]
    fn test_alias_mentions_normalize_before_grouping() {
        let (players, teams) = fixture_tables();
        let comments = vec![
            comment("c1", &["lebron"], Sentiment::Neg, None, WEEK1),
            comment("c2", &["LeBron James"], Sentiment::Neg, None, WEEK1),
        ];

        let doc = build_aggregates(&comments, 0, &players, &teams, "2024-25");
        assert_eq!(doc.player_overall.len(), 1);
        assert_eq!(doc.player_overall[0].metrics.comment_count, 2);
    }

    #[test]
    fn test_week_serializes_as_iso_date() {
        let (players, teams) = fixture_tables();
        let comments = vec![comment("c1", &["LeBron James"], Sentiment::Neg, None, WEEK1)];
        let doc = build_aggregates(&comments, 0, &players, &teams, "2024-25");

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["player_temporal"][0]["week"], "2024-10-07");
        assert_eq!(value["player_temporal"][0]["neg_count"], 1);
        assert_eq!(value["metadata"]["season"], "2024-25");
    }

    #[test]
    fn test_document_round_trips() {
        let (players, teams) = fixture_tables();
        let comments = vec![
            comment("c1", &["LeBron James"], Sentiment::Neg, Some("Lakers"), WEEK1),
            comment("c2", &["Jayson Tatum"], Sentiment::Pos, None, WEEK2),
        ];
        let doc = build_aggregates(&comments, 1, &players, &teams, "2024-25");

        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: AggregateDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
