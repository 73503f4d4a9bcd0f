//! Stage artifacts.
//!
//! An artifact describes the completed output of one stage and is the only
//! thing the next stage receives from it. Artifacts are built once through
//! their constructors and never change afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionArtifact {
    trained_file_path: PathBuf,
    test_file_path: PathBuf,
}

impl IngestionArtifact {
    pub fn new(trained_file_path: impl Into<PathBuf>, test_file_path: impl Into<PathBuf>) -> Self {
        Self {
            trained_file_path: trained_file_path.into(),
            test_file_path: test_file_path.into(),
        }
    }

    /// Path of the training partition.
    pub fn trained_file_path(&self) -> &Path {
        &self.trained_file_path
    }

    /// Path of the test partition.
    pub fn test_file_path(&self) -> &Path {
        &self.test_file_path
    }
}

/// Verdict of the validation stage.
///
/// `validation_status` is true exactly when `message` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationArtifact {
    validation_status: bool,
    message: String,
    validation_report_path: PathBuf,
}

impl ValidationArtifact {
    /// Builds the verdict from every problem found across both partitions.
    pub fn from_findings(findings: &[String], validation_report_path: impl Into<PathBuf>) -> Self {
        Self {
            validation_status: findings.is_empty(),
            message: findings.join(" "),
            validation_report_path: validation_report_path.into(),
        }
    }

    pub fn validation_status(&self) -> bool {
        self.validation_status
    }

    /// Consolidated description of the problems found; empty on success.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn validation_report_path(&self) -> &Path {
        &self.validation_report_path
    }

    /// The persisted form of this verdict.
    pub fn report(&self) -> ValidationReport {
        ValidationReport {
            validation_status: self.validation_status,
            message: self.message.clone(),
        }
    }
}

/// Validation report as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validation_status: bool,
    pub message: String,
}

/// Output of the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationArtifact {
    transformed_train_file_path: PathBuf,
    transformed_test_file_path: PathBuf,
    transformed_object_file_path: PathBuf,
}

impl TransformationArtifact {
    pub fn new(
        transformed_train_file_path: impl Into<PathBuf>,
        transformed_test_file_path: impl Into<PathBuf>,
        transformed_object_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transformed_train_file_path: transformed_train_file_path.into(),
            transformed_test_file_path: transformed_test_file_path.into(),
            transformed_object_file_path: transformed_object_file_path.into(),
        }
    }

    pub fn transformed_train_file_path(&self) -> &Path {
        &self.transformed_train_file_path
    }

    pub fn transformed_test_file_path(&self) -> &Path {
        &self.transformed_test_file_path
    }

    /// Path of the fitted preprocessing object.
    pub fn transformed_object_file_path(&self) -> &Path {
        &self.transformed_object_file_path
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    run_id: String,
    ingestion: IngestionArtifact,
    validation: ValidationArtifact,
    /// `None` when validation failed and transformation was skipped.
    transformation: Option<TransformationArtifact>,
}

impl PipelineOutcome {
    pub fn new(
        run_id: impl Into<String>,
        ingestion: IngestionArtifact,
        validation: ValidationArtifact,
        transformation: Option<TransformationArtifact>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            ingestion,
            validation,
            transformation,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn ingestion(&self) -> &IngestionArtifact {
        &self.ingestion
    }

    pub fn validation(&self) -> &ValidationArtifact {
        &self.validation
    }

    pub fn transformation(&self) -> Option<&TransformationArtifact> {
        self.transformation.as_ref()
    }
}
