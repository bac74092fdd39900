//! Embedding backends and the record indexer
//!
//! - `EmbeddingProvider` trait: text → fixed-dimension vector
//! - `OpenAiEmbedder` for OpenAI-compatible and Azure endpoints
//! - `LocalEmbedder` (FastEmbed) behind the `local-embeddings` feature
//! - `DisabledEmbedder` when nothing is configured; always reports `Unavailable`
//! - `Indexer` embeds stored records that have no vector yet

mod indexer;
#[cfg(feature = "local-embeddings")]
mod local;
mod openai;
mod provider;

pub use indexer::{IndexReport, Indexer};
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;
#[cfg(test)]
pub use provider::MockEmbeddingProvider;
pub use provider::{DisabledEmbedder, EmbeddingError, EmbeddingProvider};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Build the configured provider once at startup
///
/// Missing credentials or an unsupported provider yield a `DisabledEmbedder`,
/// so callers see `Unavailable` instead of a startup failure.
pub fn build_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    let built: Result<Arc<dyn EmbeddingProvider>, EmbeddingError> = match config.provider.as_str()
    {
        "openai" | "azure" => {
            OpenAiEmbedder::from_config(config).map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>)
        }
        #[cfg(feature = "local-embeddings")]
        "local" => {
            LocalEmbedder::new(&config.model).map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>)
        }
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(EmbeddingError::Unavailable(
            "built without the local-embeddings feature".to_string(),
        )),
        other => Err(EmbeddingError::Unavailable(format!(
            "embedding provider '{}' disabled",
            other
        ))),
    };

    match built {
        Ok(provider) => {
            tracing::info!(
                "Embedding provider ready: {} ({}D)",
                provider.model_name(),
                provider.dimension()
            );
            provider
        }
        Err(e) => {
            tracing::warn!("Embedding provider not configured: {}", e);
            Arc::new(DisabledEmbedder::new(e.to_string(), config.dimension))
        }
    }
}
