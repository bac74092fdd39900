//! Similarity ranking over embedding entries

use super::{cosine_similarity, highlight, RankedResult, RetrievalError};
use crate::embedding::EmbeddingProvider;
use crate::records::{EmbeddingEntry, QueryFilters};
use std::cmp::Ordering;
use std::sync::Arc;

pub const DEFAULT_TOP_N: usize = 10;

/// Ranks a corpus of embedding entries against a free-text query
pub struct SimilarityRanker {
    provider: Arc<dyn EmbeddingProvider>,
}

impl SimilarityRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Rank `corpus` against `query`
    ///
    /// 1. entries failing `filters` are dropped before scoring
    /// 2. the query is embedded (an `Unavailable` provider fails the whole call)
    /// 3. every survivor is scored by cosine similarity
    /// 4. results are sorted by descending score; equal scores keep corpus order
    /// 5. the list is cut to `top_n` and each result gets a highlight snippet
    pub fn rank(
        &self,
        query: &str,
        corpus: &[EmbeddingEntry],
        top_n: usize,
        filters: Option<&QueryFilters>,
    ) -> Result<Vec<RankedResult>, RetrievalError> {
        if top_n == 0 {
            return Err(RetrievalError::InvalidArgument(
                "top_n must be at least 1".to_string(),
            ));
        }

        let candidates: Vec<&EmbeddingEntry> = corpus
            .iter()
            .filter(|entry| filters.map_or(true, |f| f.matches(&entry.metadata)))
            .collect();

        let query_vector = self.provider.embed(query)?;

        let mut scored = Vec::with_capacity(candidates.len());
        for entry in candidates {
            let score = cosine_similarity(&query_vector, &entry.vector)?;
            scored.push((score, entry));
        }

        // sort_by is stable, so ties stay in corpus order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(top_n);

        tracing::debug!(
            "Ranked {} of {} entries, top score {:.3}",
            scored.len(),
            corpus.len(),
            scored.first().map(|(s, _)| *s).unwrap_or(0.0)
        );

        Ok(scored
            .into_iter()
            .map(|(score, entry)| RankedResult {
                record_id: entry.entry_id.clone(),
                document_id: entry.document_id.clone(),
                metadata: entry.metadata.clone(),
                relevance_score: score,
                highlight: highlight(query, &entry.metadata.requirement),
            })
            .collect())
    }
}
