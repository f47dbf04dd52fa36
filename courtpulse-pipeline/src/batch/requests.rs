//! Classification request construction and cost accounting

use courtpulse_common::config::ClassifierConfig;
use courtpulse_common::records::Comment;

use crate::services::classifier::{BatchRequest, Message, MessageParams};

// Batch API pricing, 50% discount applied
pub const INPUT_COST_PER_MTOK: f64 = 0.50;
pub const OUTPUT_COST_PER_MTOK: f64 = 2.50;

/// Observed average prompt size, used for pre-submission cost estimates
pub const AVG_INPUT_TOKENS: u64 = 60;

/// Build the minimal classification prompt for one comment body.
///
/// Kept deliberately short: at batch scale every prompt token is paid for
/// millions of times over.
pub fn build_prompt(comment_body: &str) -> String {
    format!(
        "Classify sentiment toward NBA players.\n\
         Slang: nasty/sick/filthy=positive, washed/brick/fraud/cooked=negative, GOAT=positive.\n\
         \n\
         Comment: {}\n\
         \n\
         Respond ONLY with JSON: {{\"s\":\"pos|neg|neu\",\"c\":0.0-1.0,\"p\":\"Player Name\"|null}}",
        comment_body
    )
}

/// Format a filtered comment into one batch request line. The comment id
/// becomes the `custom_id` so results join back to their comments.
pub fn format_batch_request(comment: &Comment, config: &ClassifierConfig) -> BatchRequest {
    BatchRequest {
        custom_id: comment.id.clone(),
        params: MessageParams {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(comment.body.as_deref().unwrap_or_default()),
            }],
        },
    }
}

/// USD cost of a token total at batch pricing.
pub fn calculate_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    let input_cost = (input_tokens as f64 / 1_000_000.0) * INPUT_COST_PER_MTOK;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * OUTPUT_COST_PER_MTOK;
    input_cost + output_cost
}

/// Estimated cost of submitting `request_count` requests, assuming average
/// prompt size and worst-case output length.
pub fn estimate_batch_cost(request_count: u64, max_tokens: u32) -> f64 {
    calculate_cost(
        request_count * AVG_INPUT_TOKENS,
        request_count * max_tokens as u64,
    )
}
