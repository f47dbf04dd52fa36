//! Result collection: response parsing and the comment join

pub mod join;
pub mod parse;

pub use join::{join_results, JoinOutcome};
pub use parse::{classify_result, parse_response, ParsedSentiment};
