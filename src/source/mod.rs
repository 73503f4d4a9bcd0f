//! Record sources feeding the ingestion stage.
//!
//! The pipeline only needs one capability from its data source: fetch every
//! record of a named collection as a table. [`DocumentStore`] provides it for
//! a file-backed document store; [`InMemorySource`] serves prepared tables.

pub mod document_store;
pub mod memory;

pub use document_store::{documents_to_batch, DocumentStore};
pub use memory::InMemorySource;

use arrow::record_batch::RecordBatch;

use crate::error::SourceError;

/// Key the document store assigns to every record.
pub const STORE_ID_FIELD: &str = "_id";

/// A source of raw tabular records.
pub trait RecordSource: Send + Sync {
    /// Fetches all records of `collection`.
    ///
    /// Column order and presence are whatever the source holds; callers must
    /// not assume anything beyond what their schema declares.
    fn fetch_collection(&self, collection: &str) -> Result<RecordBatch, SourceError>;
}
