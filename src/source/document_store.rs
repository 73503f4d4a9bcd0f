//! File-backed document store.
//!
//! A store is a root directory; each database is a subdirectory and each
//! collection a file inside it, either `<collection>.jsonl` (one JSON object
//! per line) or `<collection>.json` (a JSON array of objects).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema as ArrowSchema};
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Value};

use super::{RecordSource, STORE_ID_FIELD};
use crate::error::SourceError;

const FILE_SCHEME: &str = "file://";

/// Placeholder the store uses for missing values.
const MISSING_MARKER: &str = "na";

/// Handle to one database of a file-backed document store.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    database: String,
}

impl DocumentStore {
    /// Opens `database` in the store at `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - `file://<root>` or a bare directory path
    /// * `database` - Name of the database directory under the root
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Connection` if the URL uses another scheme or
    /// the root or database directory does not exist.
    pub fn connect(url: &str, database: &str) -> Result<Self, SourceError> {
        let root = parse_store_url(url)?;
        if !root.is_dir() {
            return Err(SourceError::Connection(format!(
                "store root '{}' is not a directory",
                root.display()
            )));
        }
        if !root.join(database).is_dir() {
            return Err(SourceError::Connection(format!(
                "database '{}' does not exist under '{}'",
                database,
                root.display()
            )));
        }

        tracing::info!(root = %root.display(), database, "Connected to document store");
        Ok(Self {
            root,
            database: database.to_string(),
        })
    }

    fn collection_file(&self, collection: &str) -> Option<PathBuf> {
        let dir = self.root.join(&self.database);
        ["jsonl", "json"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", collection, ext)))
            .find(|path| path.is_file())
    }
}

impl RecordSource for DocumentStore {
    fn fetch_collection(&self, collection: &str) -> Result<RecordBatch, SourceError> {
        let path = self
            .collection_file(collection)
            .ok_or_else(|| SourceError::CollectionNotFound {
                database: self.database.clone(),
                collection: collection.to_string(),
            })?;

        let text = fs::read_to_string(&path)?;
        let documents = if path.extension().is_some_and(|ext| ext == "jsonl") {
            parse_json_lines(collection, &text)?
        } else {
            parse_json_array(collection, &text)?
        };

        let batch = documents_to_batch(collection, documents)?;
        tracing::info!(
            collection,
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "Fetched collection"
        );
        Ok(batch)
    }
}

fn parse_store_url(url: &str) -> Result<PathBuf, SourceError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(SourceError::Connection("store URL is empty".to_string()));
    }
    if let Some(path) = url.strip_prefix(FILE_SCHEME) {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(SourceError::Connection(format!(
            "unsupported store scheme '{}'",
            scheme
        )));
    }
    Ok(PathBuf::from(url))
}

fn parse_json_lines(collection: &str, text: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let value: Value =
                serde_json::from_str(line).map_err(|e| malformed(collection, index, e))?;
            into_document(collection, index, value)
        })
        .collect()
}

fn parse_json_array(collection: &str, text: &str) -> Result<Vec<Map<String, Value>>, SourceError> {
    let value: Value = serde_json::from_str(text).map_err(|e| malformed(collection, 0, e))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| into_document(collection, index, item))
            .collect(),
        _ => Err(malformed(collection, 0, "expected a JSON array of documents")),
    }
}

fn into_document(
    collection: &str,
    index: usize,
    value: Value,
) -> Result<Map<String, Value>, SourceError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(malformed(
            collection,
            index,
            format!("expected an object, found {}", other),
        )),
    }
}

fn malformed(collection: &str, record: usize, message: impl ToString) -> SourceError {
    SourceError::MalformedDocument {
        collection: collection.to_string(),
        record,
        message: message.to_string(),
    }
}

/// Converts raw documents into a table.
///
/// The store identifier is removed, `"na"` strings become nulls and nested
/// values are kept as their JSON text. Columns follow first-seen key order;
/// a key absent from a document is null in that row.
///
/// # Errors
///
/// Returns `SourceError::EmptyCollection` when there are no documents.
pub fn documents_to_batch(
    collection: &str,
    documents: Vec<Map<String, Value>>,
) -> Result<RecordBatch, SourceError> {
    if documents.is_empty() {
        return Err(SourceError::EmptyCollection(collection.to_string()));
    }

    let mut keys: Vec<String> = Vec::new();
    let rows: Vec<Value> = documents
        .into_iter()
        .map(|document| {
            let row: Map<String, Value> = document
                .into_iter()
                .filter(|(key, _)| key != STORE_ID_FIELD)
                .map(|(key, value)| {
                    if !keys.contains(&key) {
                        keys.push(key.clone());
                    }
                    (key, flatten_value(value))
                })
                .collect();
            Value::Object(row)
        })
        .collect();

    let inferred = infer_json_schema_from_iterator(rows.iter().map(Ok))?;
    let fields: Vec<Field> = keys
        .iter()
        .filter_map(|key| inferred.field_with_name(key).ok().cloned())
        .collect();
    let schema = Arc::new(ArrowSchema::new(fields));

    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_batch_size(rows.len())
        .with_coerce_primitive(true)
        .build_decoder()?;
    decoder.serialize(&rows)?;
    Ok(decoder
        .flush()?
        .unwrap_or_else(|| RecordBatch::new_empty(schema)))
}

fn flatten_value(value: Value) -> Value {
    match value {
        Value::String(s) if s == MISSING_MARKER => Value::Null,
        Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
        other => other,
    }
}
