//! Aggregation of classified comments into dashboard views

pub mod attribution;
pub mod bar_race;
pub mod document;
pub mod metrics;
pub mod temporal;

pub use document::{build_aggregates, AggregateDocument};
