//! CSV persistence and column helpers for in-memory tables.
//!
//! Tables are Arrow `RecordBatch`es. Column types are inferred from the file
//! contents when reading; every write truncates the target so re-running a
//! stage replaces its output instead of appending to it.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, UInt32Array};
use arrow::compute::{cast, cast_with_options, concat_batches, take_record_batch, CastOptions};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Float64Type, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::StorageError;

/// Creates the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Reads a CSV file with a header row into a single batch.
pub fn read_csv(path: &Path) -> Result<RecordBatch, StorageError> {
    let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let inferred = infer_header(path, &mut file)?;
    read_with_schema(path, file, Arc::new(inferred))
}

/// Reads a CSV file, typing every column `declared` names as declared.
///
/// Columns the declaration does not mention keep their inferred type. A
/// declared column that holds no values in this file still gets its
/// declared type, with every row null.
pub fn read_csv_as(path: &Path, declared: &ArrowSchema) -> Result<RecordBatch, StorageError> {
    let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let inferred = infer_header(path, &mut file)?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|field| match declared.field_with_name(field.name()) {
            Ok(target) => Field::new(field.name(), target.data_type().clone(), true),
            Err(_) => field.as_ref().clone(),
        })
        .collect();
    read_with_schema(path, file, Arc::new(ArrowSchema::new(fields)))
}

fn infer_header(path: &Path, file: &mut File) -> Result<ArrowSchema, StorageError> {
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut *file, None)?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| StorageError::io(path, e))?;
    Ok(inferred)
}

fn read_with_schema(
    path: &Path,
    file: File,
    schema: SchemaRef,
) -> Result<RecordBatch, StorageError> {
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    tracing::debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "CSV table read"
    );
    Ok(batch)
}

/// Writes a batch as CSV with a header row, replacing any existing file.
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<(), StorageError> {
    let batch = normalize_null_columns(batch)?;
    ensure_parent(path)?;

    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;

    tracing::debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        "CSV table written"
    );
    Ok(())
}

/// Re-types columns that carry no values at all (`Null`) as strings.
///
/// Such columns appear when every record lacks a field; CSV cannot carry
/// the `Null` type, so they are written as empty text cells instead.
pub fn normalize_null_columns(batch: &RecordBatch) -> Result<RecordBatch, StorageError> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| f.data_type() == &DataType::Null)
    {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if field.data_type() == &DataType::Null {
            fields.push(Field::new(field.name(), DataType::Utf8, true));
            columns.push(cast(column, &DataType::Utf8)?);
        } else {
            fields.push(field.as_ref().clone());
            columns.push(column.clone());
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        columns,
    )?)
}

/// Casts every column `declared` names to its declared type.
///
/// Values that cannot be represented in the declared type are an error,
/// not silently nulled.
pub fn conform_columns(
    batch: &RecordBatch,
    declared: &ArrowSchema,
) -> Result<RecordBatch, StorageError> {
    let schema = batch.schema();
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        match declared.field_with_name(field.name()) {
            Ok(target) if target.data_type() != field.data_type() => {
                fields.push(Field::new(field.name(), target.data_type().clone(), true));
                columns.push(cast_with_options(column, target.data_type(), &options)?);
            }
            _ => {
                fields.push(field.as_ref().clone());
                columns.push(column.clone());
            }
        }
    }
    Ok(RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        columns,
    )?)
}

/// Column names in table order.
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

/// Returns a copy of `batch` without column `name`; absent columns are ignored.
pub fn drop_column(batch: &RecordBatch, name: &str) -> RecordBatch {
    let mut batch = batch.clone();
    if let Ok(index) = batch.schema().index_of(name) {
        batch.remove_column(index);
    }
    batch
}

/// Selects rows by position.
pub fn take_rows(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch, StorageError> {
    let indices = UInt32Array::from_iter_values(indices.iter().map(|&i| i as u32));
    Ok(take_record_batch(batch, &indices)?)
}

/// Reads a numeric or boolean column as `f64`; nulls become NaN.
pub fn column_as_f64(batch: &RecordBatch, name: &str) -> Result<Vec<f64>, StorageError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::MissingColumn(name.to_string()))?;
    let values = cast(column, &DataType::Float64)?;
    let values = values.as_primitive::<Float64Type>();
    Ok((0..values.len())
        .map(|i| {
            if values.is_null(i) {
                f64::NAN
            } else {
                values.value(i)
            }
        })
        .collect())
}
