// Embeddings module
// Text chunking plus the providers that turn chunks and queries into vectors

pub mod chunking;
pub mod hashing;
pub mod ollama;


pub use chunking::{Chunk, ChunkingConfig, chunk_document, split_text};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use tracing::debug;

use crate::config::{Config, EmbeddingBackend};
use crate::{RagError, Result};

/// A fixed-length vector representation of a piece of text
pub type Embedding = Vec<f32>;

/// Converts text into vectors of a fixed dimension.
///
/// Implementations must be deterministic for a fixed model: the same text always produces the
/// same vector, so persisted indexes stay searchable across restarts.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns. Never changes after construction.
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed several texts, returning one vector per input in the same order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Short human-readable name used in logs
    fn name(&self) -> &str;
}

/// Check that a provider honoured the 1:1, fixed-dimension contract for a batch
#[inline]
pub fn check_batch(
    provider: &dyn EmbeddingProvider,
    inputs: usize,
    embeddings: &[Embedding],
) -> Result<()> {
    if embeddings.len() != inputs {
        return Err(RagError::Embedding(format!(
            "{} returned {} embeddings for {} inputs",
            provider.name(),
            embeddings.len(),
            inputs
        )));
    }

    if let Some(bad) = embeddings
        .iter()
        .find(|embedding| embedding.len() != provider.dimension())
    {
        return Err(RagError::Embedding(format!(
            "{} returned a {}-dimensional vector, expected {}",
            provider.name(),
            bad.len(),
            provider.dimension()
        )));
    }

    Ok(())
}

/// Build the provider selected in the configuration
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    let dimension = config.embedding.dimension as usize;
    debug!(
        "Creating {:?} embedding provider ({} dimensions)",
        config.embedding.provider, dimension
    );

    match config.embedding.provider {
        EmbeddingBackend::Hashing => Ok(Box::new(HashingEmbedder::new(dimension)?)),
        EmbeddingBackend::Ollama => Ok(Box::new(OllamaEmbedder::new(&config.ollama, dimension)?)),
    }
}
