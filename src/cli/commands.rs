//! CLI command definitions for feature-forge.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::artifacts::{PipelineOutcome, ValidationReport};
use crate::logging::{LogRotation, LoggingConfig, DEFAULT_MAX_LOG_FILES};
use crate::pipeline::{PipelineConfig, TrainingPipeline};
use crate::schema::Schema;
use crate::storage::read_json;

/// Prepare model-ready training data from a document store collection.
#[derive(Parser, Debug)]
#[command(name = "feature-forge")]
#[command(about = "Ingest, validate and transform document-store records into training data")]
#[command(version)]
#[command(
    long_about = "feature-forge exports a collection from a document store, splits it into train and test partitions, validates both against a schema and, when validation passes, writes model-ready feature arrays plus the fitted preprocessing object.\n\nExample usage:\n  feature-forge run --store-url file:///data/store --split-ratio 0.2 --seed 42"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Directory for rolling JSON log files.
    #[arg(long, env = "FORGE_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// How often the log file rolls over.
    #[arg(long, value_enum, default_value_t = LogRotation::Daily, global = true)]
    pub log_rotation: LogRotation,

    /// Number of rotated log files to keep.
    #[arg(long, default_value_t = DEFAULT_MAX_LOG_FILES, global = true)]
    pub log_max_files: usize,

    /// Emit console logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl Cli {
    /// Logging settings selected on the command line.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            rotation: self.log_rotation,
            max_files: self.log_max_files,
            json: self.log_json,
        }
    }
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run ingestion, validation and transformation.
    Run(RunArgs),

    /// Load and check a schema document.
    CheckSchema {
        /// Path of the YAML schema.
        path: PathBuf,
    },

    /// Print a persisted validation report.
    ShowReport {
        /// Path of the report JSON file.
        path: PathBuf,
    },
}

/// Arguments for `feature-forge run`.
///
/// Every flag overrides the matching `FORGE_*` environment variable.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Document store location (`file://<root>` or a directory).
    #[arg(long)]
    pub store_url: Option<String>,

    /// Database holding the collection.
    #[arg(long)]
    pub database: Option<String>,

    /// Collection to ingest.
    #[arg(short, long)]
    pub collection: Option<String>,

    /// Schema document.
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Root directory for run artifacts.
    #[arg(short, long)]
    pub artifact_dir: Option<PathBuf>,

    /// Name of this run's artifact directory (default: timestamp).
    #[arg(long)]
    pub run_tag: Option<String>,

    /// Fraction of rows held out for testing, in (0, 1).
    #[arg(long)]
    pub split_ratio: Option<f64>,

    /// Seed for a reproducible split.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the run outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Applies the flags on top of `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(url) = &self.store_url {
            config = config.with_store_url(url.clone());
        }
        if let Some(database) = &self.database {
            config = config.with_database(database.clone());
        }
        if let Some(collection) = &self.collection {
            config = config.with_collection(collection.clone());
        }
        if let Some(schema) = &self.schema {
            config = config.with_schema_path(schema.clone());
        }
        if let Some(dir) = &self.artifact_dir {
            config = config.with_artifact_dir(dir.clone());
        }
        if let Some(tag) = &self.run_tag {
            config = config.with_run_tag(tag.clone());
        }
        if let Some(ratio) = self.split_ratio {
            config = config.with_split_ratio(ratio);
        }
        if let Some(seed) = self.seed {
            config = config.with_split_seed(seed);
        }
        config
    }
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For control over logging initialization, use `parse_cli()` and
/// `run_with_cli()`.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Run the CLI with the parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args),
        Commands::CheckSchema { path } => run_check_schema_command(path),
        Commands::ShowReport { path } => run_show_report_command(path),
    }
}

fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    // Flags override the environment; validation happens in connect.
    let config = args.apply(PipelineConfig::from_env()?);
    let pipeline = TrainingPipeline::connect(config)?;
    let outcome = pipeline.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    let validation = outcome.validation();

    println!("\n=== Pipeline Run {} ===", outcome.run_id());
    println!(
        "Train partition:  {}",
        outcome.ingestion().trained_file_path().display()
    );
    println!(
        "Test partition:   {}",
        outcome.ingestion().test_file_path().display()
    );
    println!(
        "Validation:       {} ({})",
        if validation.validation_status() {
            "passed"
        } else {
            "FAILED"
        },
        validation.validation_report_path().display()
    );

    match outcome.transformation() {
        Some(transformation) => {
            println!(
                "Train features:   {}",
                transformation.transformed_train_file_path().display()
            );
            println!(
                "Test features:    {}",
                transformation.transformed_test_file_path().display()
            );
            println!(
                "Preprocessing:    {}",
                transformation.transformed_object_file_path().display()
            );
        }
        None => {
            println!("Transformation:   skipped");
            println!("Reason:           {}", validation.message());
        }
    }
}

fn run_check_schema_command(path: PathBuf) -> anyhow::Result<()> {
    let schema = Schema::load(&path)
        .with_context(|| format!("Schema {} is invalid", path.display()))?;

    println!("Schema {} is valid", path.display());
    println!("  Columns:          {}", schema.column_count());
    println!("  Numerical:        {}", schema.numerical_columns().join(", "));
    println!("  Categorical:      {}", schema.categorical_columns().join(", "));
    println!("  Standardized:     {}", schema.num_features().join(", "));
    println!("  Min-max scaled:   {}", schema.mm_columns().join(", "));
    println!("  Dropped:          {}", schema.drop_column());
    println!("  Target:           {}", schema.target_column());
    for (column, mapping) in schema.binary_mappings() {
        println!(
            "  Binary mapping:   {} ({})",
            column,
            mapping.categories().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

fn run_show_report_command(path: PathBuf) -> anyhow::Result<()> {
    let report: ValidationReport = read_json(&path)
        .with_context(|| format!("Failed to read validation report {}", path.display()))?;

    println!(
        "Validation status: {}",
        if report.validation_status {
            "passed"
        } else {
            "FAILED"
        }
    );
    if !report.message.is_empty() {
        println!("Message: {}", report.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "feature-forge",
            "--log-level",
            "debug",
            "run",
            "--store-url",
            "file:///data/store",
            "--split-ratio",
            "0.2",
            "--seed",
            "42",
            "--run-tag",
            "nightly",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.json);

        let config = args.apply(PipelineConfig::default());
        assert_eq!(config.store_url, "file:///data/store");
        assert_eq!(config.split_seed, Some(42));
        assert_eq!(config.run_tag, "nightly");
        assert!((config.split_ratio - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_global_logging_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "feature-forge",
            "show-report",
            "report.json",
            "--log-rotation",
            "hourly",
            "--log-json",
        ])
        .unwrap();

        let logging = cli.logging_config();
        assert_eq!(logging.rotation, LogRotation::Hourly);
        assert!(logging.json);
        assert!(matches!(cli.command, Commands::ShowReport { .. }));
    }

    #[test]
    fn test_flag_replaces_out_of_range_ratio() {
        let cli = Cli::try_parse_from(["feature-forge", "run", "--split-ratio", "0.2"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let from_env = PipelineConfig::default().with_split_ratio(1.5);
        assert!(from_env.validate().is_err());
        let config = args.apply(from_env);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_without_flags_keeps_config() {
        let base = PipelineConfig::default().with_collection("vehicles");
        let config = RunArgs::default().apply(base.clone());
        assert_eq!(config.collection, "vehicles");
        assert_eq!(config.run_tag, base.run_tag);
    }

    #[test]
    fn test_check_schema_command() {
        let path = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/config/schema.yaml"));
        run_check_schema_command(path).unwrap();

        let err = run_check_schema_command(PathBuf::from("/no/such/schema.yaml")).unwrap_err();
        assert!(err.to_string().contains("is invalid"));
    }
}
