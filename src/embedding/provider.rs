/// Embedding provider trait and the always-unavailable provider
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Provider not configured (credentials or endpoint missing)
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),

    /// Network or provider-side failure; the caller may retry
    #[error("Embedding request failed: {0}")]
    Transient(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// Implementations never retry; retry policy belongs to the caller.
#[cfg_attr(test, mockall::automock)]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for several texts, one vector per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Whether the provider was set up with everything it needs to serve requests
    fn is_configured(&self) -> bool {
        true
    }
}

/// Provider used when no embedding backend is configured
#[derive(Debug, Clone)]
pub struct DisabledEmbedder {
    reason: String,
    dimension: usize,
}

impl DisabledEmbedder {
    pub fn new(reason: impl Into<String>, dimension: usize) -> Self {
        Self {
            reason: reason.into(),
            dimension,
        }
    }
}

impl EmbeddingProvider for DisabledEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(self.reason.clone()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Check a returned vector against the configured dimension
pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
