//! Canonical filter stages

use courtpulse_common::records::Comment;

/// Placeholder bodies Reddit substitutes for deleted or removed content
pub const INVALID_BODY_VALUES: &[&str] = &["[deleted]", "[removed]"];

/// Stage name used for rejection counters
pub const VALID_BODY: &str = "valid_body";

/// Reject comments whose body is missing, empty, or a deletion placeholder.
pub fn valid_body(comment: Comment) -> Option<Comment> {
    match comment.body.as_deref() {
        None | Some("") => None,
        Some(body) if INVALID_BODY_VALUES.contains(&body) => None,
        Some(_) => Some(comment),
    }
}
