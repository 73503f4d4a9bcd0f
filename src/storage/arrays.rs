//! Parquet persistence for transformed feature matrices.
//!
//! A matrix is stored as one non-nullable Float64 column per feature, in
//! the order the fitted pipeline emits them.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::tables::ensure_parent;
use crate::error::StorageError;

/// Converts a feature matrix into a record batch with the given column names.
pub fn matrix_to_record_batch(
    columns: &[String],
    matrix: &Array2<f64>,
) -> Result<RecordBatch, StorageError> {
    if columns.len() != matrix.ncols() {
        return Err(StorageError::Shape(format!(
            "{} column names for a matrix with {} columns",
            columns.len(),
            matrix.ncols()
        )));
    }

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|name| Field::new(name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = (0..matrix.ncols())
        .map(|j| Arc::new(Float64Array::from_iter_values(matrix.column(j).iter().copied())) as ArrayRef)
        .collect();

    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Writes a feature matrix to a Parquet file, replacing any existing file.
pub fn write_feature_matrix(
    path: &Path,
    columns: &[String],
    matrix: &Array2<f64>,
) -> Result<(), StorageError> {
    let batch = matrix_to_record_batch(columns, matrix)?;
    ensure_parent(path)?;

    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    tracing::info!(
        path = %path.display(),
        rows = matrix.nrows(),
        columns = matrix.ncols(),
        "Feature matrix written"
    );
    Ok(())
}

/// Reads a feature matrix written by [`write_feature_matrix`].
pub fn read_feature_matrix(path: &Path) -> Result<(Vec<String>, Array2<f64>), StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    for batch_result in reader {
        let batch = batch_result?;
        for (j, column) in batch.columns().iter().enumerate() {
            let column = column
                .as_primitive_opt::<Float64Type>()
                .ok_or_else(|| {
                    StorageError::Shape(format!("column '{}' is not Float64", columns[j]))
                })?;
            values[j].extend((0..column.len()).map(|i| column.value(i)));
        }
    }

    let rows = values.first().map(Vec::len).unwrap_or(0);
    let matrix = Array2::from_shape_fn((rows, columns.len()), |(i, j)| values[j][i]);
    Ok((columns, matrix))
}
