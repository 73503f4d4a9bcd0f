//! Column-wise feature pipeline.
//!
//! A [`FeaturePipeline`] names which columns are standardized and which are
//! min-max scaled; every other column passes through. Fitting it on a
//! training table yields a [`FittedFeaturePipeline`] that applies the same
//! training statistics to any table with the same columns.

use std::collections::HashSet;

use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::encoding::ensure_numeric;
use super::scaling::ColumnScaler;
use crate::error::FeatureError;
use crate::storage::{column_as_f64, column_names, has_column};

/// Unfitted pipeline description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePipeline {
    standard: Vec<String>,
    min_max: Vec<String>,
}

impl FeaturePipeline {
    pub fn new(standard: Vec<String>, min_max: Vec<String>) -> Self {
        Self { standard, min_max }
    }

    /// Fits every scaler on `batch`, which must be all-numeric.
    ///
    /// # Errors
    ///
    /// Returns `FeatureError::MissingColumn` if a scaling column is absent
    /// and `FeatureError::NonNumericColumn` if any column is not numeric.
    pub fn fit(&self, batch: &RecordBatch) -> Result<FittedFeaturePipeline, FeatureError> {
        for (role, columns) in [("num_features", &self.standard), ("mm_columns", &self.min_max)] {
            if let Some(column) = columns.iter().find(|c| !has_column(batch, c)) {
                return Err(FeatureError::MissingColumn {
                    role: role.to_string(),
                    column: column.clone(),
                });
            }
        }
        ensure_numeric(batch)?;

        let standard = self
            .standard
            .iter()
            .map(|c| -> Result<_, FeatureError> {
                Ok((c.clone(), ColumnScaler::fit_standard(&column_as_f64(batch, c)?)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let min_max = self
            .min_max
            .iter()
            .map(|c| -> Result<_, FeatureError> {
                Ok((c.clone(), ColumnScaler::fit_min_max(&column_as_f64(batch, c)?)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scaled: HashSet<&String> = self.standard.iter().chain(&self.min_max).collect();
        let passthrough = column_names(batch)
            .into_iter()
            .filter(|c| !scaled.contains(c))
            .collect();

        let fitted = FittedFeaturePipeline {
            standard,
            min_max,
            passthrough,
        };
        tracing::debug!(
            rows = batch.num_rows(),
            outputs = fitted.output_columns().len(),
            "Feature pipeline fitted"
        );
        Ok(fitted)
    }
}

/// Feature pipeline with training statistics attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedFeaturePipeline {
    standard: Vec<(String, ColumnScaler)>,
    min_max: Vec<(String, ColumnScaler)>,
    passthrough: Vec<String>,
}

impl FittedFeaturePipeline {
    /// Output column names: standardized, then min-max, then passthrough.
    pub fn output_columns(&self) -> Vec<String> {
        self.standard
            .iter()
            .chain(&self.min_max)
            .map(|(c, _)| c.clone())
            .chain(self.passthrough.iter().cloned())
            .collect()
    }

    /// Applies the fitted statistics to `batch`.
    ///
    /// # Errors
    ///
    /// The table must carry exactly the columns seen during fitting.
    pub fn transform(&self, batch: &RecordBatch) -> Result<Array2<f64>, FeatureError> {
        let outputs = self.output_columns();
        for column in &outputs {
            if !has_column(batch, column) {
                return Err(FeatureError::MissingColumn {
                    role: "fitted feature pipeline".to_string(),
                    column: column.clone(),
                });
            }
        }
        if batch.num_columns() != outputs.len() {
            let unknown: Vec<String> = column_names(batch)
                .into_iter()
                .filter(|c| !outputs.contains(c))
                .collect();
            return Err(FeatureError::Shape(format!(
                "columns not seen during fitting: {}",
                unknown.join(", ")
            )));
        }
        ensure_numeric(batch)?;

        let rows = batch.num_rows();
        let mut matrix = Array2::<f64>::zeros((rows, outputs.len()));
        let scaled = self
            .standard
            .iter()
            .chain(&self.min_max)
            .map(|(c, scaler)| (c, Some(scaler)));
        let passthrough = self.passthrough.iter().map(|c| (c, None));

        for (j, (column, scaler)) in scaled.chain(passthrough).enumerate() {
            let values = column_as_f64(batch, column)?;
            for (i, value) in values.into_iter().enumerate() {
                matrix[[i, j]] = match scaler {
                    Some(s) => s.apply(value),
                    None => value,
                };
            }
        }
        Ok(matrix)
    }
}
