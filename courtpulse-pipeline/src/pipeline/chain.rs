//! Composable comment filter chain
//!
//! Stages run in registration order; the first stage to reject a comment
//! stops processing and its counter records the rejection. Counters for
//! every stage exist from construction, so a summary always lists each
//! stage even when nothing was rejected by it.

use courtpulse_common::records::Comment;

type StageFn = Box<dyn Fn(Comment) -> Option<Comment> + Send + Sync>;

struct Stage {
    name: String,
    func: StageFn,
    rejected: u64,
}

/// Point-in-time copy of chain counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub total: u64,
    pub accepted: u64,
    /// Per-stage rejection counts, in registration order
    pub rejected: Vec<(String, u64)>,
}

impl ChainStats {
    /// Accepted fraction of all processed comments, 0.0 when none seen.
    pub fn accept_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total as f64
        }
    }
}

/// Ordered filter stages with per-stage rejection accounting.
#[derive(Default)]
pub struct FilterChain {
    stages: Vec<Stage>,
    total: u64,
    accepted: u64,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. A stage returns the (possibly modified) comment to
    /// pass it along, or `None` to reject it.
    pub fn with_stage(
        mut self,
        name: impl Into<String>,
        func: impl Fn(Comment) -> Option<Comment> + Send + Sync + 'static,
    ) -> Self {
        self.stages.push(Stage {
            name: name.into(),
            func: Box::new(func),
            rejected: 0,
        });
        self
    }

    /// Run a comment through all stages.
    pub fn process(&mut self, comment: Comment) -> Option<Comment> {
        self.total += 1;
        let mut current = comment;
        for stage in &mut self.stages {
            match (stage.func)(current) {
                Some(next) => current = next,
                None => {
                    stage.rejected += 1;
                    return None;
                }
            }
        }
        self.accepted += 1;
        Some(current)
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total: self.total,
            accepted: self.accepted,
            rejected: self
                .stages
                .iter()
                .map(|s| (s.name.clone(), s.rejected))
                .collect(),
        }
    }

    pub fn reset_stats(&mut self) {
        self.total = 0;
        self.accepted = 0;
        for stage in &mut self.stages {
            stage.rejected = 0;
        }
    }
}
