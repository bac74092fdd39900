/// Lazy embedding of stored records
use super::{EmbeddingError, EmbeddingProvider};
use crate::error::{Result, RfpError};
use crate::records::{EmbeddingEntry, RequirementRecord};
use crate::storage::Database;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of an indexing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub embedded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Embeds every record that has no embedding yet and upserts the result
///
/// Records are processed in batches. A batch that fails with a transient error is
/// retried one record at a time so a single bad row does not sink its neighbours.
/// An unconfigured provider aborts the run.
pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    database: Arc<Database>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        database: Arc<Database>,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            database,
            batch_size: batch_size.max(1),
        }
    }

    pub fn run(&self) -> Result<IndexReport> {
        if !self.provider.is_configured() {
            return Err(RfpError::Config(
                "embedding provider is not configured".to_string(),
            ));
        }

        let start = std::time::Instant::now();
        let pending = self.database.records_missing_embeddings()?;
        info!(
            "Embedding {} records with {}",
            pending.len(),
            self.provider.model_name()
        );

        let mut report = IndexReport::default();
        for chunk in pending.chunks(self.batch_size) {
            match self.embed_chunk(chunk) {
                Ok(count) => {
                    report.embedded += count;
                    debug!("Embedded chunk of {} records", count);
                }
                Err(EmbeddingError::Unavailable(reason)) => {
                    return Err(RfpError::Config(format!(
                        "embedding provider unavailable: {}",
                        reason
                    )));
                }
                Err(e) => {
                    warn!("Batch failed ({}), retrying records one by one", e);
                    let (ok, failed) = self.embed_individually(chunk)?;
                    report.embedded += ok;
                    report.failed += failed;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Indexing complete: {} embedded, {} failed, {}ms",
            report.embedded, report.failed, report.duration_ms
        );
        Ok(report)
    }

    fn embed_chunk(
        &self,
        chunk: &[RequirementRecord],
    ) -> std::result::Result<usize, EmbeddingError> {
        let texts: Vec<String> = chunk.iter().map(RequirementRecord::embedding_text).collect();
        let vectors = self.provider.embed_batch(&texts)?;

        if vectors.len() != chunk.len() {
            return Err(EmbeddingError::Transient(format!(
                "received {} vectors for {} records",
                vectors.len(),
                chunk.len()
            )));
        }

        for (record, vector) in chunk.iter().zip(vectors) {
            self.store(record, vector)
                .map_err(|e| EmbeddingError::Transient(e.to_string()))?;
        }
        Ok(chunk.len())
    }

    fn embed_individually(&self, chunk: &[RequirementRecord]) -> Result<(usize, usize)> {
        let mut ok = 0;
        let mut failed = 0;
        for record in chunk {
            match self.provider.embed(&record.embedding_text()) {
                Ok(vector) => {
                    self.store(record, vector)?;
                    ok += 1;
                }
                Err(EmbeddingError::Unavailable(reason)) => {
                    return Err(RfpError::Config(format!(
                        "embedding provider unavailable: {}",
                        reason
                    )));
                }
                Err(e) => {
                    warn!("Failed to embed record {}: {}", record.id, e);
                    failed += 1;
                }
            }
        }
        Ok((ok, failed))
    }

    fn store(&self, record: &RequirementRecord, vector: Vec<f32>) -> Result<()> {
        let entry = EmbeddingEntry::for_record(record, vector);
        self.database
            .upsert_embedding(&entry, self.provider.model_name())
    }
}
