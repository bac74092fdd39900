//! Storage layer for rfpqa
//!
//! The retrieval core only reads through `RecordStore`; writes (ingestion, embedding
//! upserts, deletion) go straight to the SQLite `Database`.

pub mod database;

use crate::error::Result;
use crate::records::{EmbeddingEntry, QueryFilters, RequirementRecord};

pub use database::{Database, DbPool, StoreStats};

/// Read interface the retrieval core consumes
///
/// Both listings return entries in corpus (insertion) order.
pub trait RecordStore: Send + Sync {
    fn list_embeddings(&self, filters: Option<&QueryFilters>) -> Result<Vec<EmbeddingEntry>>;

    fn list_records(&self, filters: Option<&QueryFilters>) -> Result<Vec<RequirementRecord>>;
}
