//! feature-forge CLI entry point.
//!
//! Initializes logging and delegates to the CLI module for command handling.

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first to get the logging settings
    let cli = feature_forge::cli::parse_cli();

    // RUST_LOG env var > --log-level CLI arg > default "info"
    let _guard = feature_forge::logging::init_logging(&cli.logging_config())?;

    feature_forge::cli::run_with_cli(cli)
}
