//! Pipeline runner.
//!
//! The runner owns everything that lives for a whole run: the resolved
//! configuration, the schema and the single record-source handle. Stages
//! borrow from it and never open their own connections.

use std::sync::Arc;

use uuid::Uuid;

use super::config::{ConfigError, PipelineConfig};
use crate::artifacts::PipelineOutcome;
use crate::error::{ErrorKind, PipelineError, ResultExt};
use crate::schema::Schema;
use crate::source::{DocumentStore, RecordSource};
use crate::stages::{DataIngestion, DataTransformation, DataValidation};
use crate::storage::write_json;

/// Runs ingestion, validation and transformation in sequence.
pub struct TrainingPipeline {
    config: PipelineConfig,
    schema: Schema,
    source: Arc<dyn RecordSource>,
}

impl std::fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("config", &self.config)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl TrainingPipeline {
    /// Creates a runner backed by the document store named in `config`.
    ///
    /// The store is opened here, once, and released when the runner is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or has
    /// no store URL, and a source error if the store cannot be opened.
    pub fn connect(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        if config.store_url.trim().is_empty() {
            return Err(PipelineError::from(ConfigError::MissingEnvVar(
                "FORGE_STORE_URL".to_string(),
            )));
        }

        let store = DocumentStore::connect(&config.store_url, &config.database).or_fail(
            ErrorKind::Source,
            format!("could not open document store '{}'", config.store_url),
        )?;
        Self::with_source(config, Arc::new(store))
    }

    /// Creates a runner reading from an already opened source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration or the schema is
    /// invalid.
    pub fn with_source(
        config: PipelineConfig,
        source: Arc<dyn RecordSource>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let schema = Schema::load(&config.schema_path)?;

        tracing::info!(
            collection = %config.collection,
            run_dir = %config.run_dir().display(),
            "Pipeline initialized"
        );
        Ok(Self {
            config,
            schema,
            source,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runs every stage and writes the run manifest.
    ///
    /// Transformation only runs when validation passed; otherwise the
    /// outcome carries no transformation artifact.
    ///
    /// # Errors
    ///
    /// Any stage error aborts the run. Artifacts already written stay on
    /// disk.
    pub fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let _span = tracing::info_span!("pipeline", run_id = %run_id).entered();
        tracing::info!(run_tag = %self.config.run_tag, "Pipeline run started");

        let stages = self.config.stage_configs();

        let ingestion = DataIngestion::new(&stages.ingestion, self.source.as_ref()).run()?;
        let validation = DataValidation::new(&ingestion, &stages.validation, &self.schema).run()?;

        let transformation = if validation.validation_status() {
            Some(
                DataTransformation::new(
                    &ingestion,
                    &validation,
                    &stages.transformation,
                    &self.schema,
                )
                .run()?,
            )
        } else {
            tracing::warn!(
                findings = validation.message(),
                "Skipping data transformation because validation failed"
            );
            None
        };

        let outcome = PipelineOutcome::new(run_id, ingestion, validation, transformation);
        let manifest = self.config.manifest_path();
        write_json(&manifest, &outcome).or_fail(
            ErrorKind::Io,
            format!("could not write run manifest '{}'", manifest.display()),
        )?;

        tracing::info!(
            manifest = %manifest.display(),
            validated = outcome.validation().validation_status(),
            transformed = outcome.transformation().is_some(),
            "Pipeline run finished"
        );
        Ok(outcome)
    }
}

impl Drop for TrainingPipeline {
    fn drop(&mut self) {
        tracing::debug!(collection = %self.config.collection, "Record source released");
    }
}
