//! In-memory record source.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;

use super::RecordSource;
use crate::error::SourceError;

const MEMORY_DATABASE: &str = "memory";

/// Serves prepared tables by collection name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    collections: HashMap<String, RecordBatch>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a collection.
    pub fn with_collection(mut self, name: impl Into<String>, batch: RecordBatch) -> Self {
        self.collections.insert(name.into(), batch);
        self
    }
}

impl RecordSource for InMemorySource {
    fn fetch_collection(&self, collection: &str) -> Result<RecordBatch, SourceError> {
        let batch = self
            .collections
            .get(collection)
            .ok_or_else(|| SourceError::CollectionNotFound {
                database: MEMORY_DATABASE.to_string(),
                collection: collection.to_string(),
            })?;
        if batch.num_rows() == 0 {
            return Err(SourceError::EmptyCollection(collection.to_string()));
        }
        Ok(batch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use std::sync::Arc;

    #[test]
    fn test_fetch_registered_collection() {
        let batch = RecordBatch::try_from_iter(vec![(
            "Age",
            Arc::new(Int64Array::from(vec![21, 35])) as ArrayRef,
        )])
        .unwrap();
        let source = InMemorySource::new().with_collection("cars", batch);

        assert_eq!(source.fetch_collection("cars").unwrap().num_rows(), 2);
        assert!(matches!(
            source.fetch_collection("bikes"),
            Err(SourceError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let batch = RecordBatch::try_from_iter(vec![(
            "Age",
            Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef,
        )])
        .unwrap();
        let source = InMemorySource::new().with_collection("cars", batch);
        assert!(matches!(
            source.fetch_collection("cars"),
            Err(SourceError::EmptyCollection(_))
        ));
    }
}
