//! Persistence for fitted objects and JSON documents.
//!
//! Fitted objects are serialized as JSON and gzip-compressed. That format is
//! not meant to be read by other tools; it only has to survive a round trip
//! through [`save_object`] and [`load_object`]. Reports and manifests are
//! plain, pretty-printed JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::tables::ensure_parent;
use crate::error::StorageError;

/// Serializes `value` to `path`, replacing any existing file.
pub fn save_object<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;

    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, value)?;
    let mut writer = encoder.finish().map_err(|e| StorageError::io(path, e))?;
    writer.flush().map_err(|e| StorageError::io(path, e))?;

    tracing::debug!(path = %path.display(), "Object saved");
    Ok(())
}

/// Deserializes an object written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let value = serde_json::from_reader(decoder)?;

    tracing::debug!(path = %path.display(), "Object loaded");
    Ok(value)
}

/// Writes `value` as pretty-printed JSON, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Reads a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
