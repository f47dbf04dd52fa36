//! Comment filtering pipeline

pub mod chain;
pub mod mentions;
pub mod stages;

pub use chain::{ChainStats, FilterChain};
pub use mentions::MentionMatcher;
