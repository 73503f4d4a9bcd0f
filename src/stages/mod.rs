//! Pipeline stages.
//!
//! Each stage receives its configuration and the artifacts it depends on by
//! reference, does its work through a single `run()` entry point and returns
//! one artifact. Stages never modify each other's outputs.
//!
//! Control flow is strictly linear:
//!
//! ```text
//! DataIngestion ──► DataValidation ──► DataTransformation
//! ```

pub mod ingestion;
pub mod transformation;
pub mod validation;

pub use ingestion::{test_partition_size, DataIngestion};
pub use transformation::DataTransformation;
pub use validation::{DataValidation, MissingColumns, Partition};
