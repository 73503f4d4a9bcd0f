//! feature-forge: data preparation pipeline for model training.
//!
//! This library exports records from a document store, splits them into
//! train and test partitions, validates them against a declarative schema
//! and transforms them into model-ready feature arrays.

// Core modules
pub mod artifacts;
pub mod cli;
pub mod error;
pub mod features;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod stages;
pub mod storage;

// Re-export commonly used types
pub use artifacts::{
    IngestionArtifact, PipelineOutcome, TransformationArtifact, ValidationArtifact,
    ValidationReport,
};
pub use error::{
    ErrorKind, FeatureError, PipelineError, ResultExt, SchemaError, SourceError, StorageError,
};
pub use features::PreprocessingObject;
pub use pipeline::{PipelineConfig, TrainingPipeline};
pub use schema::Schema;
pub use source::{DocumentStore, InMemorySource, RecordSource};
