//! Player mention detection
//!
//! Case-insensitive substring matching against each player's aliases. Short
//! aliases that collide with common words ("AD", "Ja", "Curry") only match
//! as whole words: "AD is dominant" counts, "advertisement" does not.

use courtpulse_common::records::Comment;
use courtpulse_common::roster::PlayerTable;

/// Stage name used for rejection counters
pub const PLAYER_MENTIONS: &str = "player_mentions";

struct Alias {
    text: String,
    whole_word: bool,
}

impl Alias {
    fn matches(&self, haystack_lower: &str) -> bool {
        if self.whole_word {
            contains_word(haystack_lower, &self.text)
        } else {
            haystack_lower.contains(self.text.as_str())
        }
    }
}

/// Precompiled alias matcher for the whole roster.
pub struct MentionMatcher {
    players: Vec<(String, Vec<Alias>)>,
}

impl MentionMatcher {
    pub fn new(table: &PlayerTable) -> Self {
        let players = table
            .players
            .iter()
            .map(|(name, entry)| {
                let aliases = entry
                    .aliases
                    .iter()
                    .map(|alias| {
                        let text = alias.to_lowercase();
                        let whole_word = table.is_short_alias(&text);
                        Alias { text, whole_word }
                    })
                    .collect();
                (name.clone(), aliases)
            })
            .collect();
        Self { players }
    }

    /// Canonical names of all players mentioned in `body`, each at most once.
    pub fn find_mentions(&self, body: &str) -> Vec<String> {
        if body.is_empty() {
            return Vec::new();
        }
        let lower = body.to_lowercase();
        self.players
            .iter()
            .filter(|(_, aliases)| aliases.iter().any(|a| a.matches(&lower)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Mention filter stage: attach mentioned players, or reject the comment
/// when it has no body or mentions nobody tracked.
pub fn attach_mentions(matcher: &MentionMatcher, mut comment: Comment) -> Option<Comment> {
    let body = comment.body.as_deref().unwrap_or("");
    let mentions = matcher.find_mentions(body);
    if mentions.is_empty() {
        return None;
    }
    comment.mentioned_players = mentions;
    Some(comment)
}

/// Whole-word containment: `needle` must not touch an alphanumeric character
/// on either side. Both arguments are expected lowercase.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}
