//! Feature engineering for the transformation stage.
//!
//! # Overview
//!
//! - **Encoding**: identifier removal, target separation, binary mapping,
//!   indicator expansion and boolean coercion
//! - **Scaling**: standard and min-max scalers fit on training data
//! - **Pipeline**: the column-wise transform built from the schema
//!
//! [`PreprocessingObject`] bundles everything learned from the training
//! partition so the exact transform can be reloaded and reapplied later.

pub mod encoding;
pub mod pipeline;
pub mod scaling;

pub use encoding::{
    coerce_boolean_columns, drop_identifier_column, ensure_numeric, map_binary_columns,
    sanitize_column_name, split_target, IndicatorLevels,
};
pub use pipeline::{FeaturePipeline, FittedFeaturePipeline};
pub use scaling::ColumnScaler;

use std::collections::BTreeMap;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, StorageError};
use crate::schema::{declared_arrow_schema, BinaryMapping, ColumnSpec, Schema};
use crate::storage::{conform_columns, drop_column, load_object, save_object};

/// Fitted preprocessing state, persisted next to the transformed arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingObject {
    columns: Vec<ColumnSpec>,
    drop_column: String,
    target_column: String,
    binary_mappings: BTreeMap<String, BinaryMapping>,
    indicators: IndicatorLevels,
    pipeline: FittedFeaturePipeline,
}

impl PreprocessingObject {
    /// Learns categories and scaling statistics from training features.
    ///
    /// `features` is the training table with the target already removed.
    pub fn fit(
        schema: &Schema,
        pipeline: &FeaturePipeline,
        features: &RecordBatch,
    ) -> Result<Self, FeatureError> {
        let typed = conform_columns(features, &schema.arrow_schema())?;
        let base = drop_identifier_column(&typed, schema.drop_column());
        let mapped = map_binary_columns(&base, schema.binary_mappings())?;
        let indicators = IndicatorLevels::fit(&mapped);
        let numeric = coerce_boolean_columns(&indicators.expand(&mapped)?)?;
        let fitted = pipeline.fit(&numeric)?;

        Ok(Self {
            columns: schema.columns().to_vec(),
            drop_column: schema.drop_column().to_string(),
            target_column: schema.target_column().to_string(),
            binary_mappings: schema.binary_mappings().clone(),
            indicators,
            pipeline: fitted,
        })
    }

    /// Normalizes and transforms a raw table.
    ///
    /// Declared columns are first cast to their schema types, so a column
    /// read without values is still numeric. The identifier and target
    /// columns are ignored if present.
    pub fn transform_table(&self, table: &RecordBatch) -> Result<Array2<f64>, FeatureError> {
        let typed = conform_columns(table, &declared_arrow_schema(&self.columns))?;
        let base = drop_column(
            &drop_identifier_column(&typed, &self.drop_column),
            &self.target_column,
        );
        let mapped = map_binary_columns(&base, &self.binary_mappings)?;
        let numeric = coerce_boolean_columns(&self.indicators.expand(&mapped)?)?;
        self.pipeline.transform(&numeric)
    }

    /// Names of the matrix columns produced by [`Self::transform_table`].
    pub fn output_columns(&self) -> Vec<String> {
        self.pipeline.output_columns()
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        save_object(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        load_object(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, NullArray, StringArray};
    use std::sync::Arc;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
columns:
  - id: int
  - Gender: category
  - Age: int
  - Vehicle_Damage: category
  - Annual_Premium: float
  - Response: int
numerical_columns: [Age, Annual_Premium, Response]
categorical_columns: [Gender, Vehicle_Damage]
num_features: [Age]
mm_columns: [Annual_Premium]
drop_columns: id
target_column: Response
binary_mappings:
  Gender: { Female: 0, Male: 1 }
"#;

    fn table(
        ids: Vec<i64>,
        gender: Vec<&str>,
        age: Vec<i64>,
        damage: Vec<&str>,
        premium: Vec<f64>,
    ) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
            ("Gender", Arc::new(StringArray::from(gender)) as ArrayRef),
            ("Age", Arc::new(Int64Array::from(age)) as ArrayRef),
            ("Vehicle_Damage", Arc::new(StringArray::from(damage)) as ArrayRef),
            ("Annual_Premium", Arc::new(Float64Array::from(premium)) as ArrayRef),
        ])
        .unwrap()
    }

    fn fit_object() -> PreprocessingObject {
        let schema = Schema::from_yaml_str(SCHEMA).unwrap();
        let pipeline = FeaturePipeline::new(
            schema.num_features().to_vec(),
            schema.mm_columns().to_vec(),
        );
        let train = table(
            vec![1, 2],
            vec!["Male", "Female"],
            vec![20, 40],
            vec!["Yes", "No"],
            vec![100.0, 300.0],
        );
        PreprocessingObject::fit(&schema, &pipeline, &train).unwrap()
    }

    #[test]
    fn test_fit_and_transform() {
        let object = fit_object();
        assert_eq!(
            object.output_columns(),
            vec!["Age", "Annual_Premium", "Gender", "Vehicle_Damage_Yes"]
        );

        let test = table(vec![7], vec!["Female"], vec![30], vec!["Yes"], vec![200.0]);
        let matrix = object.transform_table(&test).unwrap();
        assert_eq!(matrix.row(0).to_vec(), vec![0.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_untyped_null_columns_follow_declared_types() {
        let object = fit_object();
        let test = RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(vec![7, 8])) as ArrayRef),
            ("Gender", Arc::new(StringArray::from(vec!["Male", "Female"])) as ArrayRef),
            ("Age", Arc::new(NullArray::new(2)) as ArrayRef),
            ("Vehicle_Damage", Arc::new(StringArray::from(vec!["No", "Yes"])) as ArrayRef),
            ("Annual_Premium", Arc::new(Float64Array::from(vec![100.0, 300.0])) as ArrayRef),
        ])
        .unwrap();

        let matrix = object.transform_table(&test).unwrap();
        assert!(matrix.column(0).iter().all(|v| v.is_nan()));
        assert_eq!(matrix.column(1).to_vec(), vec![0.0, 1.0]);
        assert_eq!(matrix.column(3).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_save_and_reload_reproduces_transform() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preprocessing.bin");
        let object = fit_object();
        object.save(&path).unwrap();

        let reloaded = PreprocessingObject::load(&path).unwrap();
        assert_eq!(reloaded, object);

        let test = table(vec![9], vec!["Male"], vec![50], vec!["No"], vec![400.0]);
        assert_eq!(
            reloaded.transform_table(&test).unwrap(),
            object.transform_table(&test).unwrap()
        );
    }
}
