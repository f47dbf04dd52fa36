//! # CourtPulse Common Library
//!
//! Shared code for the CourtPulse pipeline including:
//! - Comment and classification record types
//! - Durable state ledgers (batch submissions, download progress)
//! - Roster configuration (players, teams, aliases)
//! - Configuration loading and data path layout
//! - Human-readable formatting helpers

pub mod config;
pub mod error;
pub mod human_format;
pub mod paths;
pub mod records;
pub mod roster;
pub mod state;

pub use error::{Error, Result};
pub use paths::DataPaths;
