//! Validation stage: check the ingested partitions against the schema.
//!
//! Structural problems found here are findings, not errors. They are
//! collected for both partitions, recorded in the artifact and the persisted
//! report, and the stage still completes. Only failures to read the inputs
//! or write the report are errors.

use std::fmt;

use arrow::record_batch::RecordBatch;

use crate::artifacts::{IngestionArtifact, ValidationArtifact};
use crate::error::{ErrorKind, PipelineError, ResultExt};
use crate::pipeline::config::ValidationConfig;
use crate::schema::Schema;
use crate::storage::{has_column, read_csv, write_json};

/// Which ingested partition a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Training,
    Testing,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Training => write!(f, "training"),
            Partition::Testing => write!(f, "testing"),
        }
    }
}

/// Schema columns absent from a table, grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingColumns {
    pub numerical: Vec<String>,
    pub categorical: Vec<String>,
}

impl MissingColumns {
    pub fn is_empty(&self) -> bool {
        self.numerical.is_empty() && self.categorical.is_empty()
    }
}

/// Checks ingested data for structural conformance with the schema.
pub struct DataValidation<'a> {
    ingestion: &'a IngestionArtifact,
    config: &'a ValidationConfig,
    schema: &'a Schema,
}

impl<'a> DataValidation<'a> {
    pub fn new(
        ingestion: &'a IngestionArtifact,
        config: &'a ValidationConfig,
        schema: &'a Schema,
    ) -> Self {
        Self {
            ingestion,
            config,
            schema,
        }
    }

    /// True iff the table has exactly as many columns as the schema declares.
    pub fn check_column_count(&self, table: &RecordBatch) -> bool {
        table.num_columns() == self.schema.column_count()
    }

    /// Collects every numerical and categorical schema column the table lacks.
    pub fn check_required_columns_present(&self, table: &RecordBatch) -> MissingColumns {
        let absent = |columns: &[String]| -> Vec<String> {
            columns
                .iter()
                .filter(|c| !has_column(table, c))
                .cloned()
                .collect()
        };
        MissingColumns {
            numerical: absent(self.schema.numerical_columns()),
            categorical: absent(self.schema.categorical_columns()),
        }
    }

    /// Describes every problem found in one partition.
    pub fn findings(&self, table: &RecordBatch, partition: Partition) -> Vec<String> {
        let mut findings = Vec::new();

        if !self.check_column_count(table) {
            findings.push(format!(
                "Column count mismatch in {} dataframe: expected {}, found {}.",
                partition,
                self.schema.column_count(),
                table.num_columns()
            ));
        }

        let missing = self.check_required_columns_present(table);
        if !missing.numerical.is_empty() {
            findings.push(format!(
                "Missing numerical columns in {} dataframe: {}.",
                partition,
                missing.numerical.join(", ")
            ));
        }
        if !missing.categorical.is_empty() {
            findings.push(format!(
                "Missing categorical columns in {} dataframe: {}.",
                partition,
                missing.categorical.join(", ")
            ));
        }

        findings
    }

    /// Validates both partitions and persists the report.
    ///
    /// A failed validation still returns an artifact; the report is written
    /// either way.
    pub fn run(&self) -> Result<ValidationArtifact, PipelineError> {
        let _span = tracing::info_span!("data_validation").entered();
        tracing::info!("Starting data validation");

        let mut findings = Vec::new();
        for (path, partition) in [
            (self.ingestion.trained_file_path(), Partition::Training),
            (self.ingestion.test_file_path(), Partition::Testing),
        ] {
            let table = read_csv(path).or_fail(
                ErrorKind::Io,
                format!("could not read {} partition '{}'", partition, path.display()),
            )?;
            let found = self.findings(&table, partition);
            tracing::debug!(%partition, problems = found.len(), "Checked partition");
            findings.extend(found);
        }

        let artifact =
            ValidationArtifact::from_findings(&findings, self.config.report_path());
        let report_path = self.config.report_path();
        write_json(report_path, &artifact.report()).or_fail(
            ErrorKind::Io,
            format!("could not write validation report '{}'", report_path.display()),
        )?;

        if artifact.validation_status() {
            tracing::info!(report = %report_path.display(), "Data validation passed");
        } else {
            tracing::warn!(
                report = %report_path.display(),
                findings = artifact.message(),
                "Data validation failed"
            );
        }
        Ok(artifact)
    }
}
