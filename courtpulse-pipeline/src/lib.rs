//! # CourtPulse Pipeline Library
//!
//! Ingestion-to-aggregation pipeline for NBA comment sentiment.
//!
//! **Purpose:** Download archived subreddit comments, filter them down to
//! player mentions, classify sentiment through the batch API, and aggregate
//! the results into dashboard-ready documents.
//!
//! **Architecture:** A chain of restartable stages, each reading the previous
//! stage's file output and writing its own, with durable JSON ledgers for
//! the steps that talk to remote services.

pub mod aggregate;
pub mod batch;
pub mod collect;
pub mod commands;
pub mod pipeline;
pub mod services;
