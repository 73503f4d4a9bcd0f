//! Command-line interface for feature-forge.
//!
//! Provides commands to run the pipeline, check a schema document and
//! inspect a persisted validation report.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, RunArgs};
