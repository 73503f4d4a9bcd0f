//! Transformation stage: turn validated partitions into model-ready arrays.

use ndarray::{concatenate, Array1, Array2, Axis};

use crate::artifacts::{IngestionArtifact, TransformationArtifact, ValidationArtifact};
use crate::error::{ErrorKind, FeatureError, PipelineError, ResultExt};
use crate::features::{drop_identifier_column, split_target, FeaturePipeline, PreprocessingObject};
use crate::pipeline::config::TransformationConfig;
use crate::schema::Schema;
use crate::storage::{read_csv_as, write_feature_matrix};

/// Fits the feature pipeline on training data and applies it to both
/// partitions.
pub struct DataTransformation<'a> {
    ingestion: &'a IngestionArtifact,
    validation: &'a ValidationArtifact,
    config: &'a TransformationConfig,
    schema: &'a Schema,
}

impl<'a> DataTransformation<'a> {
    pub fn new(
        ingestion: &'a IngestionArtifact,
        validation: &'a ValidationArtifact,
        config: &'a TransformationConfig,
        schema: &'a Schema,
    ) -> Self {
        Self {
            ingestion,
            validation,
            config,
            schema,
        }
    }

    /// Standardizes `num_features`, min-max scales `mm_columns` and passes
    /// every other column through.
    pub fn build_feature_pipeline(&self) -> FeaturePipeline {
        FeaturePipeline::new(
            self.schema.num_features().to_vec(),
            self.schema.mm_columns().to_vec(),
        )
    }

    /// Transforms both partitions and persists the arrays and fitted object.
    ///
    /// # Errors
    ///
    /// Fails with a validation-gate error, before touching any file, when
    /// the validation artifact reports failure.
    pub fn run(&self) -> Result<TransformationArtifact, PipelineError> {
        let _span = tracing::info_span!("data_transformation").entered();

        if !self.validation.validation_status() {
            return Err(PipelineError::validation_gate(format!(
                "data validation failed, refusing to transform: {}",
                self.validation.message()
            )));
        }
        tracing::info!("Starting data transformation");

        // Both partitions use the declared types, whatever each file holds.
        let declared = self.schema.arrow_schema();
        let train = read_csv_as(self.ingestion.trained_file_path(), &declared)
            .or_fail(ErrorKind::Io, "could not read training partition")?;
        let test = read_csv_as(self.ingestion.test_file_path(), &declared)
            .or_fail(ErrorKind::Io, "could not read testing partition")?;

        let target = self.schema.target_column();
        let (train_features, train_target) =
            split_target(&drop_identifier_column(&train, self.schema.drop_column()), target)?;
        let (test_features, test_target) =
            split_target(&drop_identifier_column(&test, self.schema.drop_column()), target)?;

        let pipeline = self.build_feature_pipeline();
        let object = PreprocessingObject::fit(self.schema, &pipeline, &train_features)?;

        let train_matrix = with_target(object.transform_table(&train_features)?, train_target)?;
        let test_matrix = with_target(object.transform_table(&test_features)?, test_target)?;

        let mut columns = object.output_columns();
        columns.push(object.target_column().to_string());

        write_feature_matrix(self.config.transformed_train_path(), &columns, &train_matrix)?;
        write_feature_matrix(self.config.transformed_test_path(), &columns, &test_matrix)?;
        object.save(self.config.transformed_object_path())?;

        let artifact = TransformationArtifact::new(
            self.config.transformed_train_path(),
            self.config.transformed_test_path(),
            self.config.transformed_object_path(),
        );
        tracing::info!(
            features = columns.len() - 1,
            train_rows = train_matrix.nrows(),
            test_rows = test_matrix.nrows(),
            object = %artifact.transformed_object_file_path().display(),
            "Data transformation completed"
        );
        Ok(artifact)
    }
}

/// Appends the target as the last matrix column.
fn with_target(features: Array2<f64>, target: Vec<f64>) -> Result<Array2<f64>, FeatureError> {
    let target = Array1::from(target).insert_axis(Axis(1));
    concatenate(Axis(1), &[features.view(), target.view()])
        .map_err(|e| FeatureError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{read_csv, read_feature_matrix, write_csv};
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
columns:
  - id: int
  - Gender: category
  - Age: int
  - Vehicle_Age: category
  - Annual_Premium: float
  - Response: int
numerical_columns: [Age, Annual_Premium, Response]
categorical_columns: [Gender, Vehicle_Age]
num_features: [Age]
mm_columns: [Annual_Premium]
drop_columns: id
target_column: Response
binary_mappings:
  Gender: { Female: 0, Male: 1 }
"#;

    fn partition(offset: i64) -> RecordBatch {
        partition_with(
            offset,
            vec![Some(20), Some(30), Some(40)],
            vec![Some(1000.0), Some(2000.0), Some(3000.0)],
        )
    }

    fn partition_with(offset: i64, age: Vec<Option<i64>>, premium: Vec<Option<f64>>) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(vec![offset, offset + 1, offset + 2])) as ArrayRef),
            (
                "Gender",
                Arc::new(StringArray::from(vec!["Male", "Female", "Male"])) as ArrayRef,
            ),
            ("Age", Arc::new(Int64Array::from(age)) as ArrayRef),
            (
                "Vehicle_Age",
                Arc::new(StringArray::from(vec!["< 1 Year", "1-2 Year", "> 2 Years"])) as ArrayRef,
            ),
            (
                "Annual_Premium",
                Arc::new(Float64Array::from(premium)) as ArrayRef,
            ),
            ("Response", Arc::new(Int64Array::from(vec![1, 0, 1])) as ArrayRef),
        ])
        .unwrap()
    }

    struct Fixture {
        dir: TempDir,
        schema: Schema,
        ingestion: IngestionArtifact,
        config: TransformationConfig,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let train = dir.path().join("ingested/train.csv");
        let test = dir.path().join("ingested/test.csv");
        write_csv(&train, &partition(0)).unwrap();
        write_csv(&test, &partition(100)).unwrap();

        let out = dir.path().join("data_transformation");
        let config = TransformationConfig::new(
            out.join("transformed/train.parquet"),
            out.join("transformed/test.parquet"),
            out.join("transformed_object/preprocessing.bin"),
        );
        Fixture {
            schema: Schema::from_yaml_str(SCHEMA).unwrap(),
            ingestion: IngestionArtifact::new(train, test),
            config,
            dir,
        }
    }

    #[test]
    fn test_gate_rejects_failed_validation() {
        let f = fixture();
        let validation = ValidationArtifact::from_findings(
            &["Missing numerical columns in training dataframe: Age.".to_string()],
            f.dir.path().join("report.json"),
        );

        let err = DataTransformation::new(&f.ingestion, &validation, &f.config, &f.schema)
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationGate);
        assert!(!f.config.transformed_train_path().exists());
        assert!(!f.config.transformed_test_path().exists());
        assert!(!f.config.transformed_object_path().exists());
    }

    #[test]
    fn test_run_writes_arrays_and_object() {
        let f = fixture();
        let validation = ValidationArtifact::from_findings(&[], f.dir.path().join("report.json"));

        let artifact = DataTransformation::new(&f.ingestion, &validation, &f.config, &f.schema)
            .run()
            .unwrap();

        let (columns, train) = read_feature_matrix(artifact.transformed_train_file_path()).unwrap();
        assert_eq!(
            columns,
            vec![
                "Age",
                "Annual_Premium",
                "Gender",
                "Vehicle_Age_lt_1_Year",
                "Vehicle_Age_gt_2_Years",
                "Response"
            ]
        );
        assert_eq!(train.dim(), (3, 6));
        assert_eq!(train.column(1).to_vec(), vec![0.0, 0.5, 1.0]);
        assert_eq!(train.column(2).to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(train.column(3).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(train.column(5).to_vec(), vec![1.0, 0.0, 1.0]);
        assert!(train.column(0).sum().abs() < 1e-12);

        let object = PreprocessingObject::load(artifact.transformed_object_file_path()).unwrap();
        let test_table = read_csv(f.ingestion.test_file_path()).unwrap();
        let reapplied = object.transform_table(&test_table).unwrap();
        let (_, test) = read_feature_matrix(artifact.transformed_test_file_path()).unwrap();
        assert_eq!(reapplied, test.slice(ndarray::s![.., ..5]).to_owned());
    }

    #[test]
    fn test_column_without_values_in_test_partition() {
        let f = fixture();
        let empty_age = partition_with(100, vec![None; 3], vec![Some(1500.0); 3]);
        write_csv(f.ingestion.test_file_path(), &empty_age).unwrap();
        let validation = ValidationArtifact::from_findings(&[], f.dir.path().join("report.json"));

        let artifact = DataTransformation::new(&f.ingestion, &validation, &f.config, &f.schema)
            .run()
            .unwrap();

        let (columns, test) = read_feature_matrix(artifact.transformed_test_file_path()).unwrap();
        assert_eq!(columns[0], "Age");
        assert!(test.column(0).iter().all(|v| v.is_nan()));
        assert_eq!(test.column(1).to_vec(), vec![0.25; 3]);
        assert_eq!(test.column(2).to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_column_without_values_in_train_partition() {
        let f = fixture();
        let empty_premium = partition_with(0, vec![Some(20), Some(30), Some(40)], vec![None; 3]);
        write_csv(f.ingestion.trained_file_path(), &empty_premium).unwrap();
        let validation = ValidationArtifact::from_findings(&[], f.dir.path().join("report.json"));

        let artifact = DataTransformation::new(&f.ingestion, &validation, &f.config, &f.schema)
            .run()
            .unwrap();

        let (columns, train) = read_feature_matrix(artifact.transformed_train_file_path()).unwrap();
        assert_eq!(columns[1], "Annual_Premium");
        assert_eq!(train.dim(), (3, 6));
        assert!(train.column(1).iter().all(|v| v.is_nan()));

        // Unfitted min-max statistics leave test values unscaled.
        let (_, test) = read_feature_matrix(artifact.transformed_test_file_path()).unwrap();
        assert_eq!(test.column(1).to_vec(), vec![1000.0, 2000.0, 3000.0]);
    }

    #[test]
    fn test_missing_target_is_configuration_error() {
        let f = fixture();
        let without_target = crate::storage::drop_column(&partition(0), "Response");
        write_csv(f.ingestion.trained_file_path(), &without_target).unwrap();
        let validation = ValidationArtifact::from_findings(&[], f.dir.path().join("report.json"));

        let err = DataTransformation::new(&f.ingestion, &validation, &f.config, &f.schema)
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
