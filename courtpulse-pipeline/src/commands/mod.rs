//! One module per pipeline subcommand
//!
//! Each module owns its clap args struct and a `run` entry point; `main`
//! only parses the command line and dispatches.

pub mod aggregate;
pub mod clean;
pub mod collect;
pub mod download;
pub mod export;
pub mod filter;
pub mod prepare;
pub mod submit;
