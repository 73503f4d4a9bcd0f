//! Pipeline configuration and orchestration.
//!
//! # Architecture
//!
//! - **Config**: every setting resolved once at start-up, with per-stage
//!   configurations derived from it
//! - **Runner**: owns the schema and the record source and sequences the
//!   stages
//!
//! # Pipeline Flow
//!
//! 1. **Ingestion**: the collection is exported to the feature store and
//!    split into train and test partitions
//! 2. **Validation**: both partitions are checked against the schema and a
//!    report is written
//! 3. **Transformation**: on a passing validation, the feature pipeline is
//!    fit on the training partition and applied to both
//! 4. **Manifest**: the artifacts of the run are recorded in
//!    `run_manifest.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use feature_forge::pipeline::{PipelineConfig, TrainingPipeline};
//!
//! let config = PipelineConfig::from_env()?
//!     .with_split_ratio(0.2)
//!     .with_split_seed(42);
//!
//! let pipeline = TrainingPipeline::connect(config)?;
//! let outcome = pipeline.run()?;
//!
//! if let Some(transformation) = outcome.transformation() {
//!     println!("Arrays at {}", transformation.transformed_train_file_path().display());
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::{
    ConfigError, IngestionConfig, PipelineConfig, StageConfigs, TransformationConfig,
    ValidationConfig,
};
pub use runner::TrainingPipeline;
