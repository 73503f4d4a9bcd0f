//! Column normalization applied before the feature pipeline.
//!
//! These helpers turn a raw table into an all-numeric one: the identifier
//! column is removed, the target split off, two-valued categories mapped to
//! 0/1 and the remaining categories expanded into indicator columns.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, StorageError};
use crate::schema::BinaryMapping;
use crate::storage::{column_as_f64, drop_column, has_column};

/// Removes the identifier column if the table has it.
pub fn drop_identifier_column(batch: &RecordBatch, column: &str) -> RecordBatch {
    drop_column(batch, column)
}

/// Separates the target column from the features.
///
/// # Errors
///
/// Returns `FeatureError::MissingColumn` if the target is absent.
pub fn split_target(
    batch: &RecordBatch,
    target: &str,
) -> Result<(RecordBatch, Vec<f64>), FeatureError> {
    if !has_column(batch, target) {
        return Err(FeatureError::MissingColumn {
            role: "target_column".to_string(),
            column: target.to_string(),
        });
    }
    let values = column_as_f64(batch, target)?;
    Ok((drop_column(batch, target), values))
}

/// Replaces each mapped column with its 0/1 codes.
///
/// Nulls stay null. A value without a code is a data error.
pub fn map_binary_columns(
    batch: &RecordBatch,
    mappings: &BTreeMap<String, BinaryMapping>,
) -> Result<RecordBatch, FeatureError> {
    let mut batch = batch.clone();
    for (column, mapping) in mappings {
        let index = batch
            .schema()
            .index_of(column)
            .map_err(|_| FeatureError::MissingColumn {
                role: "binary_mappings".to_string(),
                column: column.clone(),
            })?;

        let values = batch.column(index);
        let strings = values
            .as_string_opt::<i32>()
            .ok_or_else(|| FeatureError::UnexpectedType {
                column: column.clone(),
                data_type: values.data_type().to_string(),
            })?;

        let codes = strings
            .iter()
            .map(|value| match value {
                None => Ok(None),
                Some(v) => mapping
                    .encode(v)
                    .map(Some)
                    .ok_or_else(|| FeatureError::UnknownCategory {
                        column: column.clone(),
                        value: v.to_string(),
                    }),
            })
            .collect::<Result<Int64Array, _>>()?;

        batch = replace_column(&batch, index, column, Arc::new(codes))?;
    }
    Ok(batch)
}

/// Categories of each string column, learned from training data.
///
/// Levels are sorted; the first level of every column is the reference
/// category and gets no indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorLevels {
    columns: Vec<(String, Vec<String>)>,
}

impl IndicatorLevels {
    /// Collects the distinct non-null values of every string column.
    pub fn fit(batch: &RecordBatch) -> Self {
        let columns = batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .filter_map(|(field, values)| {
                let strings = values.as_string_opt::<i32>()?;
                let levels: BTreeSet<&str> = strings.iter().flatten().collect();
                Some((
                    field.name().clone(),
                    levels.into_iter().map(str::to_string).collect(),
                ))
            })
            .collect();
        Self { columns }
    }

    /// Names of the indicator columns produced for `column`.
    pub fn indicator_names(&self, column: &str) -> Vec<String> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(name, levels)| {
                levels
                    .iter()
                    .skip(1)
                    .map(|level| sanitize_column_name(&format!("{}_{}", name, level)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces every fitted column with boolean indicator columns.
    ///
    /// Values never seen during fitting, and nulls, encode as all false.
    pub fn expand(&self, batch: &RecordBatch) -> Result<RecordBatch, FeatureError> {
        let schema = batch.schema();
        for (column, _) in &self.columns {
            if !has_column(batch, column) {
                return Err(FeatureError::MissingColumn {
                    role: "categorical_columns".to_string(),
                    column: column.clone(),
                });
            }
        }

        let mut fields: Vec<Field> = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for (field, values) in schema.fields().iter().zip(batch.columns()) {
            let Some((_, levels)) = self.columns.iter().find(|(name, _)| name == field.name())
            else {
                fields.push(field.as_ref().clone());
                arrays.push(values.clone());
                continue;
            };

            let strings = values
                .as_string_opt::<i32>()
                .ok_or_else(|| FeatureError::UnexpectedType {
                    column: field.name().clone(),
                    data_type: values.data_type().to_string(),
                })?;
            for level in levels.iter().skip(1) {
                let name = sanitize_column_name(&format!("{}_{}", field.name(), level));
                let indicator: BooleanArray = strings
                    .iter()
                    .map(|value| Some(value == Some(level.as_str())))
                    .collect();
                fields.push(Field::new(name, DataType::Boolean, false));
                arrays.push(Arc::new(indicator));
            }
        }

        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name().as_str()) {
                return Err(FeatureError::DuplicateColumn(field.name().clone()));
            }
        }

        Ok(RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), arrays)
            .map_err(StorageError::from)?)
    }
}

/// Turns an arbitrary label into an identifier-safe column name.
///
/// `<` and `>` become `lt` and `gt`; every other run of characters outside
/// `[A-Za-z0-9_]` collapses to a single underscore.
pub fn sanitize_column_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        match c {
            '<' | '>' => {
                out.push_str(if c == '<' { "lt" } else { "gt" });
                in_run = false;
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                out.push(c);
                in_run = false;
            }
            _ => {
                if !in_run {
                    out.push('_');
                }
                in_run = true;
            }
        }
    }
    out
}

/// Casts boolean columns to 0/1 integers.
pub fn coerce_boolean_columns(batch: &RecordBatch) -> Result<RecordBatch, FeatureError> {
    let mut batch = batch.clone();
    let boolean_columns: Vec<(usize, String)> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type() == &DataType::Boolean)
        .map(|(i, f)| (i, f.name().clone()))
        .collect();

    for (index, name) in boolean_columns {
        let values = cast(batch.column(index), &DataType::Int64)
            .map_err(StorageError::from)?;
        batch = replace_column(&batch, index, &name, values)?;
    }
    Ok(batch)
}

/// Fails on the first column that is not numeric.
pub fn ensure_numeric(batch: &RecordBatch) -> Result<(), FeatureError> {
    match batch
        .schema()
        .fields()
        .iter()
        .find(|f| !f.data_type().is_numeric())
    {
        Some(field) => Err(FeatureError::NonNumericColumn {
            column: field.name().clone(),
            data_type: field.data_type().to_string(),
        }),
        None => Ok(()),
    }
}

fn replace_column(
    batch: &RecordBatch,
    index: usize,
    name: &str,
    values: ArrayRef,
) -> Result<RecordBatch, FeatureError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    fields[index] = Field::new(name, values.data_type().clone(), true);
    columns[index] = values;
    Ok(RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)
        .map_err(StorageError::from)?)
}
