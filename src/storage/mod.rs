//! File persistence for pipeline artifacts.
//!
//! # Overview
//!
//! - **Tables**: CSV files read into and written from Arrow record batches
//! - **Arrays**: Transformed feature matrices stored as Parquet
//! - **Objects**: Fitted preprocessing objects stored as compressed JSON,
//!   reports and manifests as plain JSON
//!
//! Every writer creates missing parent directories and truncates the target,
//! so re-running a stage with the same run tag replaces its outputs.

pub mod arrays;
pub mod objects;
pub mod tables;

pub use arrays::{matrix_to_record_batch, read_feature_matrix, write_feature_matrix};
pub use objects::{load_object, read_json, save_object, write_json};
pub use tables::{
    column_as_f64, column_names, conform_columns, drop_column, ensure_parent, has_column,
    normalize_null_columns, read_csv, read_csv_as, take_rows, write_csv,
};
