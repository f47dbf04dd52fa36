//! Joining downloaded results back to filtered comments
//!
//! Inner join on comment id: a successful classification without a matching
//! comment is dropped (and counted), a comment without a result simply never
//! appears. Failed requests are kept whole for the failures file.

use std::collections::HashMap;

use courtpulse_common::records::{ClassificationResult, ClassifiedComment, Comment};

use crate::collect::parse::classify_result;
use crate::services::classifier::{BatchResultLine, ResultType};

/// Everything the collect step needs to report after a join.
#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub classified: Vec<ClassifiedComment>,
    /// Requests that ended errored, canceled, expired, or unparseable
    pub failed: Vec<BatchResultLine>,
    pub total_results: u64,
    /// Results that produced a valid classification
    pub succeeded: u64,
    /// Valid classifications with no matching filtered comment
    pub dropped: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

impl JoinOutcome {
    /// Dropped share of valid classifications, as a percentage.
    pub fn drop_rate_pct(&self) -> f64 {
        if self.succeeded == 0 {
            0.0
        } else {
            self.dropped as f64 / self.succeeded as f64 * 100.0
        }
    }
}

/// Join downloaded results with filtered comments keyed by id.
///
/// Token totals accumulate over all succeeded requests, including those
/// whose response text failed to parse: the tokens were still spent.
pub fn join_results(
    results: Vec<BatchResultLine>,
    comments: &HashMap<String, Comment>,
) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();

    for line in results {
        outcome.total_results += 1;
        if line.result_type == ResultType::Succeeded {
            outcome.total_input_tokens += line.input_tokens;
            outcome.total_output_tokens += line.output_tokens;
        }

        match classify_result(&line) {
            ClassificationResult::Succeeded {
                sentiment,
                confidence,
                sentiment_player,
                input_tokens,
                output_tokens,
            } => {
                outcome.succeeded += 1;
                match comments.get(&line.custom_id) {
                    Some(comment) => outcome.classified.push(ClassifiedComment {
                        comment_id: line.custom_id,
                        body: comment.body.clone().unwrap_or_default(),
                        author: comment.author.clone(),
                        author_flair_text: comment.author_flair_text.clone(),
                        author_flair_css_class: comment.author_flair_css_class.clone(),
                        created_utc: comment.created_utc,
                        score: comment.score,
                        mentioned_players: comment.mentioned_players.clone(),
                        sentiment,
                        confidence,
                        sentiment_player,
                        input_tokens,
                        output_tokens,
                    }),
                    None => outcome.dropped += 1,
                }
            }
            ClassificationResult::Errored { .. }
            | ClassificationResult::Canceled
            | ClassificationResult::Expired => outcome.failed.push(line),
        }
    }

    outcome
}
