//! Sentiment counting and derived rate metrics

use serde::{Deserialize, Serialize};

use courtpulse_common::records::Sentiment;

/// Round to 4 decimal places, matching the precision of exported rates.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Running tally of classified comments for one group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentCounts {
    pub neg: u64,
    pub pos: u64,
    pub neu: u64,
}

impl SentimentCounts {
    pub fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Neg => self.neg += 1,
            Sentiment::Pos => self.pos += 1,
            Sentiment::Neu => self.neu += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.neg + self.pos + self.neu
    }

    pub fn finish(&self) -> SentimentMetrics {
        let total = self.total();
        let denom = if total == 0 { 1.0 } else { total as f64 };
        SentimentMetrics {
            neg_count: self.neg,
            pos_count: self.pos,
            neu_count: self.neu,
            comment_count: total,
            neg_rate: round4(self.neg as f64 / denom),
            pos_rate: round4(self.pos as f64 / denom),
            net_sentiment: round4((self.pos as f64 - self.neg as f64) / denom),
            polarization: round4((self.pos as f64 + self.neg as f64) / denom),
        }
    }
}

/// Per-group metrics block shared by every aggregate view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentMetrics {
    pub neg_count: u64,
    pub pos_count: u64,
    pub neu_count: u64,
    pub comment_count: u64,
    pub neg_rate: f64,
    pub pos_rate: f64,
    pub net_sentiment: f64,
    pub polarization: f64,
}
