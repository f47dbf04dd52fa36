//! Core record types flowing through the pipeline
//!
//! A comment enters as raw archive JSON, is projected onto [`Comment`] when
//! parsed, gains `mentioned_players` in the filter step, and is joined with
//! its classification outcome into a [`ClassifiedComment`].

use serde::{Deserialize, Serialize};

/// One Reddit comment, carrying only the fields used downstream.
///
/// Raw archive lines have ~60 fields; deserializing into this struct keeps
/// the eleven we need and drops the rest. `mentioned_players` is empty until
/// the mention filter attaches canonical player names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Stable comment identifier (join key for classification results)
    pub id: String,
    /// Comment text; absent or placeholder for deleted content
    pub body: Option<String>,
    pub author: Option<String>,
    pub author_flair_text: Option<String>,
    pub author_flair_css_class: Option<String>,
    pub subreddit: Option<String>,
    /// Creation time, seconds since epoch
    pub created_utc: i64,
    pub score: Option<i64>,
    pub controversiality: Option<i64>,
    pub parent_id: Option<String>,
    pub link_id: Option<String>,
    /// Canonical names of tracked players mentioned in the body
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_players: Vec<String>,
}

/// Closed set of sentiment labels the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Pos,
    Neg,
    Neu,
}

impl Sentiment {
    /// Parse a label string from a model response.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "pos" => Some(Sentiment::Pos),
            "neg" => Some(Sentiment::Neg),
            "neu" => Some(Sentiment::Neu),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Pos => "pos",
            Sentiment::Neg => "neg",
            Sentiment::Neu => "neu",
        }
    }
}

/// Outcome of one classification request, exactly one per request once its
/// batch ends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    /// Model produced a recognized label
    Succeeded {
        sentiment: Sentiment,
        confidence: f64,
        /// Player the model attributed the sentiment to, when it named one
        sentiment_player: Option<String>,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Request failed, or the response text could not be parsed
    Errored { message: String },
    Canceled,
    Expired,
}

/// A filtered comment joined with its successful classification.
///
/// One line of the classified output file; the aggregation step consumes
/// these exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedComment {
    pub comment_id: String,
    pub body: String,
    pub author: Option<String>,
    pub author_flair_text: Option<String>,
    pub author_flair_css_class: Option<String>,
    pub created_utc: i64,
    pub score: Option<i64>,
    pub mentioned_players: Vec<String>,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub sentiment_player: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_drops_unknown_fields() {
        let raw = r#"{
            "id": "abc123",
            "body": "LeBron is washed",
            "author": "hoopsfan42",
            "author_flair_text": "Lakers",
            "author_flair_css_class": "lakers",
            "subreddit": "nba",
            "created_utc": 1709251200,
            "score": 42,
            "controversiality": 0,
            "parent_id": "t1_xyz789",
            "link_id": "t3_post123",
            "gilded": 0,
            "stickied": false,
            "retrieved_on": 1709251300
        }"#;

        let comment: Comment = serde_json::from_str(raw).unwrap();
        assert_eq!(comment.id, "abc123");
        assert_eq!(comment.body.as_deref(), Some("LeBron is washed"));
        assert_eq!(comment.score, Some(42));
        assert!(comment.mentioned_players.is_empty());

        let out = serde_json::to_value(&comment).unwrap();
        assert!(out.get("gilded").is_none());
        assert!(out.get("mentioned_players").is_none());
    }

    #[test]
    fn test_comment_missing_body_is_none() {
        let raw = r#"{"id": "nobody123", "created_utc": 1709251200}"#;
        let comment: Comment = serde_json::from_str(raw).unwrap();
        assert!(comment.body.is_none());
    }

    #[test]
    fn test_mentioned_players_round_trip() {
        let raw = r#"{
            "id": "p1",
            "body": "text",
            "created_utc": 100,
            "mentioned_players": ["LeBron James", "Stephen Curry"]
        }"#;
        let comment: Comment = serde_json::from_str(raw).unwrap();
        assert_eq!(comment.mentioned_players.len(), 2);

        let out = serde_json::to_string(&comment).unwrap();
        let back: Comment = serde_json::from_str(&out).unwrap();
        assert_eq!(back.mentioned_players, comment.mentioned_players);
    }

    #[test]
    fn test_sentiment_labels() {
        assert_eq!(Sentiment::from_label("pos"), Some(Sentiment::Pos));
        assert_eq!(Sentiment::from_label("neg"), Some(Sentiment::Neg));
        assert_eq!(Sentiment::from_label("neu"), Some(Sentiment::Neu));
        assert_eq!(Sentiment::from_label("positive"), None);
        assert_eq!(Sentiment::Neg.as_str(), "neg");
    }

    #[test]
    fn test_sentiment_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sentiment::Pos).unwrap(), "\"pos\"");
        let s: Sentiment = serde_json::from_str("\"neu\"").unwrap();
        assert_eq!(s, Sentiment::Neu);
    }
}
