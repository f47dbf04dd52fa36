//! Comment-to-player and flair-to-team attribution

use std::collections::HashMap;

use courtpulse_common::roster::TeamTable;

/// Attribute a comment to a single canonical player.
///
/// Four-bucket logic:
/// 1. Single mentioned player: return it (normalized through the alias map).
/// 2. Multiple mentions and the model named a canonical player: return as-is.
/// 3. Multiple mentions and the model's name normalizes via the alias map:
///    return the canonical name.
/// 4. Otherwise: no attribution.
pub fn resolve_player(
    mentioned_players: &[String],
    sentiment_player: Option<&str>,
    alias_map: &HashMap<String, String>,
) -> Option<String> {
    if mentioned_players.is_empty() {
        return None;
    }

    if mentioned_players.len() == 1 {
        let player = &mentioned_players[0];
        return Some(
            alias_map
                .get(&player.to_lowercase())
                .cloned()
                .unwrap_or_else(|| player.clone()),
        );
    }

    let sentiment_player = match sentiment_player {
        Some(p) if !p.is_empty() => p,
        _ => return None,
    };

    if alias_map.values().any(|canonical| canonical == sentiment_player) {
        return Some(sentiment_player.to_string());
    }

    alias_map.get(&sentiment_player.to_lowercase()).cloned()
}

/// Flair-to-team matcher with aliases pre-sorted longest first, so
/// "hornets" wins over "nets" inside the same flair text.
pub struct FlairMatcher {
    aliases: Vec<(String, String)>,
}

impl FlairMatcher {
    pub fn new(teams: &TeamTable) -> Self {
        let mut aliases: Vec<(String, String)> = teams.alias_map().into_iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { aliases }
    }

    /// Canonical team for a flair text, or `None` when nothing matches.
    pub fn team_for_flair(&self, flair_text: Option<&str>) -> Option<String> {
        let flair = flair_text?;
        if flair.is_empty() {
            return None;
        }
        let lower = flair.to_lowercase();
        self.aliases
            .iter()
            .find(|(alias, _)| lower.contains(alias.as_str()))
            .map(|(_, team)| team.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtpulse_common::roster::TeamTable;

    fn alias_map() -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (alias, canonical) in [
            ("lebron james", "LeBron James"),
            ("lebron", "LeBron James"),
            ("lbj", "LeBron James"),
            ("stephen curry", "Stephen Curry"),
            ("curry", "Stephen Curry"),
        ] {
            map.insert(alias.to_string(), canonical.to_string());
        }
        map
    }

    fn teams() -> TeamTable {
        toml::from_str(
            r#"
[teams."Charlotte Hornets"]
abbreviation = "CHA"
conference = "East"
aliases = ["hornets"]

[teams."Brooklyn Nets"]
abbreviation = "BKN"
conference = "East"
aliases = ["nets"]

[teams."Los Angeles Lakers"]
abbreviation = "LAL"
conference = "West"
aliases = ["lakers", "lal-1"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_single_mention_wins_regardless_of_model() {
        let map = alias_map();
        let mentioned = vec!["LeBron James".to_string()];
        // The model named someone else; the single mention still wins
        assert_eq!(
            resolve_player(&mentioned, Some("Stephen Curry"), &map),
            Some("LeBron James".to_string())
        );
    }

    #[test]
    fn test_single_mention_normalized_through_alias_map() {
        let map = alias_map();
        assert_eq!(
            resolve_player(&["lebron".to_string()], None, &map),
            Some("LeBron James".to_string())
        );
        // Unknown names pass through unchanged
        assert_eq!(
            resolve_player(&["Unknown Guy".to_string()], None, &map),
            Some("Unknown Guy".to_string())
        );
    }

    #[test]
    fn test_no_mentions_no_attribution() {
        assert_eq!(resolve_player(&[], Some("LeBron James"), &alias_map()), None);
    }

    #[test]
    fn test_multi_mention_needs_model_pick() {
        let map = alias_map();
        let mentioned = vec!["LeBron James".to_string(), "Stephen Curry".to_string()];

        assert_eq!(resolve_player(&mentioned, None, &map), None);
        assert_eq!(resolve_player(&mentioned, Some(""), &map), None);
        assert_eq!(
            resolve_player(&mentioned, Some("LeBron James"), &map),
            Some("LeBron James".to_string())
        );
        // Alias resolves, case-insensitively
        assert_eq!(
            resolve_player(&mentioned, Some("LEBRON"), &map),
            Some("LeBron James".to_string())
        );
        // A name the roster does not know fails attribution
        assert_eq!(resolve_player(&mentioned, Some("Michael Jordan"), &map), None);
    }

    #[test]
    fn test_longest_alias_checked_first() {
        let matcher = FlairMatcher::new(&teams());
        assert_eq!(
            matcher.team_for_flair(Some(":cha: Hornets fan")),
            Some("Charlotte Hornets".to_string())
        );
        assert_eq!(
            matcher.team_for_flair(Some("nets in 6")),
            Some("Brooklyn Nets".to_string())
        );
    }

    #[test]
    fn test_flair_emote_codes_match() {
        let matcher = FlairMatcher::new(&teams());
        assert_eq!(
            matcher.team_for_flair(Some(":lal-1: Lakers")),
            Some("Los Angeles Lakers".to_string())
        );
    }

    #[test]
    fn test_missing_or_unmatched_flair() {
        let matcher = FlairMatcher::new(&teams());
        assert_eq!(matcher.team_for_flair(None), None);
        assert_eq!(matcher.team_for_flair(Some("")), None);
        assert_eq!(matcher.team_for_flair(Some("just here for the games")), None);
    }
}
