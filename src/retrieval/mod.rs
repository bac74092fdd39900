//! Retrieval core: similarity ranking, highlighting and keyword fallback
//!
//! The ranker scans the (pre-filtered) corpus linearly; there is no ANN index.

mod fallback;
mod highlight;
mod ranker;
mod similarity;

pub use fallback::{FallbackOutcome, FallbackPath, FallbackSource, KeywordSearcher};
pub use highlight::{highlight, query_terms};
pub use ranker::{SimilarityRanker, DEFAULT_TOP_N};
pub use similarity::cosine_similarity;

use crate::embedding::EmbeddingError;
use crate::records::{clean_for_display, strip_unnamed, RecordMetadata};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    /// A dependency is not configured; permanent for the process lifetime
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Transient backend failure: {0}")]
    Transient(String),

    /// Misconfiguration detected at query time, e.g. vector dimension mismatch
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification used by orchestration to pick fallback vs error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    Transient,
    Configuration,
    Validation,
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidArgument(_) => ErrorKind::Validation,
        }
    }
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Unavailable(msg) => Self::Unavailable(msg),
            EmbeddingError::Transient(msg) => Self::Transient(msg),
            EmbeddingError::InvalidInput(msg) => Self::InvalidArgument(msg),
            e @ EmbeddingError::DimensionMismatch { .. } => Self::Configuration(e.to_string()),
        }
    }
}

/// One ranked requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub record_id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub metadata: RecordMetadata,
    /// Cosine similarity clamped to [0, 1]
    pub relevance_score: f32,
    pub highlight: String,
}

impl RankedResult {
    /// Strip column labels from the requirement and highlight before the
    /// result leaves the crate
    pub fn for_display(mut self) -> Self {
        self.metadata.requirement = clean_for_display(&self.metadata.requirement);
        self.highlight = strip_unnamed(&self.highlight);
        self
    }
}
