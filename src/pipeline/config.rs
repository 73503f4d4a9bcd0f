//! Pipeline configuration.
//!
//! This module resolves every setting the pipeline needs once, at start-up:
//! document store location, collection, schema file, artifact layout and the
//! train/test split. Stage configurations are derived from it as immutable
//! value objects; no stage reads the environment on its own.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default schema document shipped with the crate.
pub const DEFAULT_SCHEMA_PATH: &str = "config/schema.yaml";

/// Default root directory for per-run artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "artifact";

/// Default database holding the raw collection.
pub const DEFAULT_DATABASE: &str = "Proj1";

/// Default collection exported by ingestion.
pub const DEFAULT_COLLECTION: &str = "Proj1-Data";

/// Default fraction of rows held out as the test partition.
pub const DEFAULT_SPLIT_RATIO: f64 = 0.25;

const DATA_INGESTION_DIR: &str = "data_ingestion";
const FEATURE_STORE_DIR: &str = "feature_store";
const INGESTED_DIR: &str = "ingested";
const RAW_FILE_NAME: &str = "data.csv";
const TRAIN_FILE_NAME: &str = "train.csv";
const TEST_FILE_NAME: &str = "test.csv";

const DATA_VALIDATION_DIR: &str = "data_validation";
const REPORT_FILE_NAME: &str = "report.json";

const DATA_TRANSFORMATION_DIR: &str = "data_transformation";
const TRANSFORMED_DIR: &str = "transformed";
const TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.parquet";
const TRANSFORMED_TEST_FILE_NAME: &str = "test.parquet";
const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.bin";

/// Name of the manifest written at the end of every run.
pub const RUN_MANIFEST_FILE_NAME: &str = "run_manifest.json";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Source settings
    /// Document store location (`file://<root>` or a bare directory path).
    pub store_url: String,
    /// Database (subdirectory of the store root) holding the collection.
    pub database: String,
    /// Collection exported by the ingestion stage.
    pub collection: String,

    // Schema settings
    /// Path of the YAML schema document.
    pub schema_path: PathBuf,

    // Artifact settings
    /// Root directory under which every run gets its own directory.
    pub artifact_dir: PathBuf,
    /// Name of this run's directory below `artifact_dir`.
    pub run_tag: String,

    // Split settings
    /// Fraction of rows held out as the test partition, in (0, 1).
    pub split_ratio: f64,
    /// Seed for a reproducible split (None = non-deterministic).
    pub split_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            run_tag: default_run_tag(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            split_seed: None,
        }
    }
}

/// Timestamp-based run directory name, e.g. `10_19_2026_14_03_59`.
pub fn default_run_tag() -> String {
    chrono::Local::now().format("%m_%d_%Y_%H_%M_%S").to_string()
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FORGE_STORE_URL`: Document store location (needed to connect)
    /// - `FORGE_DATABASE`: Database name (default: Proj1)
    /// - `FORGE_COLLECTION`: Collection name (default: Proj1-Data)
    /// - `FORGE_SCHEMA_PATH`: Schema file (default: config/schema.yaml)
    /// - `FORGE_ARTIFACT_DIR`: Artifact root (default: artifact)
    /// - `FORGE_RUN_TAG`: Run directory name (default: current timestamp)
    /// - `FORGE_SPLIT_RATIO`: Test fraction (default: 0.25)
    /// - `FORGE_SPLIT_SEED`: Split seed (default: unset)
    ///
    /// Values are only parsed here. Call [`Self::validate`] once every other
    /// override has been applied, since a command-line flag may still
    /// replace an out-of-range variable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FORGE_STORE_URL") {
            config.store_url = val;
        }

        if let Ok(val) = std::env::var("FORGE_DATABASE") {
            config.database = val;
        }

        if let Ok(val) = std::env::var("FORGE_COLLECTION") {
            config.collection = val;
        }

        if let Ok(val) = std::env::var("FORGE_SCHEMA_PATH") {
            config.schema_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("FORGE_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("FORGE_RUN_TAG") {
            config.run_tag = val;
        }

        if let Ok(val) = std::env::var("FORGE_SPLIT_RATIO") {
            config.split_ratio = parse_env_value(&val, "FORGE_SPLIT_RATIO")?;
        }

        if let Ok(val) = std::env::var("FORGE_SPLIT_SEED") {
            config.split_seed = Some(parse_env_value(&val, "FORGE_SPLIT_SEED")?);
        }

        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// The store URL is checked when the store is opened, so a configuration
    /// used with an injected source does not need one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database cannot be empty".to_string(),
            ));
        }

        if self.collection.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "collection cannot be empty".to_string(),
            ));
        }

        if self.schema_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "schema_path cannot be empty".to_string(),
            ));
        }

        if self.artifact_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "artifact_dir cannot be empty".to_string(),
            ));
        }

        if self.run_tag.trim().is_empty() || self.run_tag.contains(|c: char| c == '/' || c == '\\') {
            return Err(ConfigError::ValidationFailed(
                "run_tag must be a non-empty single path component".to_string(),
            ));
        }

        validate_split_ratio(self.split_ratio)?;

        Ok(())
    }

    /// Directory holding every artifact of this run.
    pub fn run_dir(&self) -> PathBuf {
        self.artifact_dir.join(&self.run_tag)
    }

    /// Path of the manifest describing this run's artifacts.
    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir().join(RUN_MANIFEST_FILE_NAME)
    }

    /// Derives the per-stage configurations for this run.
    pub fn stage_configs(&self) -> StageConfigs {
        let run_dir = self.run_dir();
        StageConfigs {
            ingestion: IngestionConfig::under(
                &run_dir,
                &self.collection,
                self.split_ratio,
                self.split_seed,
            ),
            validation: ValidationConfig::under(&run_dir),
            transformation: TransformationConfig::under(&run_dir),
        }
    }

    /// Builder method to set the store URL.
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into();
        self
    }

    /// Builder method to set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Builder method to set the collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Builder method to set the schema path.
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Builder method to set the artifact root.
    pub fn with_artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = path.into();
        self
    }

    /// Builder method to set the run tag.
    pub fn with_run_tag(mut self, tag: impl Into<String>) -> Self {
        self.run_tag = tag.into();
        self
    }

    /// Builder method to set the split ratio.
    pub fn with_split_ratio(mut self, ratio: f64) -> Self {
        self.split_ratio = ratio;
        self
    }

    /// Builder method to set the split seed.
    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = Some(seed);
        self
    }
}

/// Checks that a split ratio lies strictly between 0 and 1.
pub fn validate_split_ratio(ratio: f64) -> Result<(), ConfigError> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
        return Err(ConfigError::ValidationFailed(format!(
            "split_ratio must be strictly between 0 and 1, got {}",
            ratio
        )));
    }
    Ok(())
}

/// Per-stage configurations derived from a [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct StageConfigs {
    pub ingestion: IngestionConfig,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
}

/// Settings for the ingestion stage.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    collection: String,
    feature_store_path: PathBuf,
    train_path: PathBuf,
    test_path: PathBuf,
    split_ratio: f64,
    split_seed: Option<u64>,
}

impl IngestionConfig {
    /// Creates an ingestion configuration with explicit paths.
    pub fn new(
        collection: impl Into<String>,
        feature_store_path: impl Into<PathBuf>,
        train_path: impl Into<PathBuf>,
        test_path: impl Into<PathBuf>,
        split_ratio: f64,
        split_seed: Option<u64>,
    ) -> Self {
        Self {
            collection: collection.into(),
            feature_store_path: feature_store_path.into(),
            train_path: train_path.into(),
            test_path: test_path.into(),
            split_ratio,
            split_seed,
        }
    }

    fn under(run_dir: &Path, collection: &str, split_ratio: f64, split_seed: Option<u64>) -> Self {
        let stage_dir = run_dir.join(DATA_INGESTION_DIR);
        Self::new(
            collection,
            stage_dir.join(FEATURE_STORE_DIR).join(RAW_FILE_NAME),
            stage_dir.join(INGESTED_DIR).join(TRAIN_FILE_NAME),
            stage_dir.join(INGESTED_DIR).join(TEST_FILE_NAME),
            split_ratio,
            split_seed,
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn feature_store_path(&self) -> &Path {
        &self.feature_store_path
    }

    pub fn train_path(&self) -> &Path {
        &self.train_path
    }

    pub fn test_path(&self) -> &Path {
        &self.test_path
    }

    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }

    pub fn split_seed(&self) -> Option<u64> {
        self.split_seed
    }
}

/// Settings for the validation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    report_path: PathBuf,
}

impl ValidationConfig {
    pub fn new(report_path: impl Into<PathBuf>) -> Self {
        Self {
            report_path: report_path.into(),
        }
    }

    fn under(run_dir: &Path) -> Self {
        Self::new(run_dir.join(DATA_VALIDATION_DIR).join(REPORT_FILE_NAME))
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }
}

/// Settings for the transformation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationConfig {
    transformed_train_path: PathBuf,
    transformed_test_path: PathBuf,
    transformed_object_path: PathBuf,
}

impl TransformationConfig {
    pub fn new(
        transformed_train_path: impl Into<PathBuf>,
        transformed_test_path: impl Into<PathBuf>,
        transformed_object_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transformed_train_path: transformed_train_path.into(),
            transformed_test_path: transformed_test_path.into(),
            transformed_object_path: transformed_object_path.into(),
        }
    }

    fn under(run_dir: &Path) -> Self {
        let stage_dir = run_dir.join(DATA_TRANSFORMATION_DIR);
        Self::new(
            stage_dir.join(TRANSFORMED_DIR).join(TRANSFORMED_TRAIN_FILE_NAME),
            stage_dir.join(TRANSFORMED_DIR).join(TRANSFORMED_TEST_FILE_NAME),
            stage_dir
                .join(TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
        )
    }

    pub fn transformed_train_path(&self) -> &Path {
        &self.transformed_train_path
    }

    pub fn transformed_test_path(&self) -> &Path {
        &self.transformed_test_path
    }

    pub fn transformed_object_path(&self) -> &Path {
        &self.transformed_object_path
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
