//! Batch preparation and submission support

pub mod files;
pub mod requests;

pub use requests::{build_prompt, calculate_cost, format_batch_request};
