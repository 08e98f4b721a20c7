// Embeddings module
// Content chunking plus the embedding backends behind the `Embedder` trait

pub mod chunking;
pub mod local;
pub mod ollama;

use tracing::info;

use crate::Result;
use crate::config::{EmbeddingBackend, EmbeddingConfig};

pub use chunking::{ChunkingConfig, Chunks, chunk, chunk_text};
#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;
pub use local::HashEmbedder;
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension vectors.
///
/// Every vector produced by one embedder has the same length. Implementations
/// block until the vector is available.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order. Fails as a whole if any text fails.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Identifier of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Check that the backend can serve requests
    fn health_check(&self) -> Result<()> {
        self.embed("health check").map(|_| ())
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    #[inline]
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    #[inline]
    fn health_check(&self) -> Result<()> {
        (**self).health_check()
    }
}

/// Build the embedder selected by configuration
#[inline]
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    config.validate()?;

    let embedder: Box<dyn Embedder> = match config.backend {
        EmbeddingBackend::Ollama => Box::new(OllamaClient::new(config)?),
        EmbeddingBackend::Hashing => Box::new(HashEmbedder::new(config.dimension as usize)),
        EmbeddingBackend::FastEmbed => create_fastembed(config)?,
    };

    info!(
        "Using {:?} embedding backend with model {}",
        config.backend,
        embedder.model_name()
    );
    Ok(embedder)
}

#[cfg(feature = "local-embeddings")]
fn create_fastembed(_config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastEmbedder::new()?))
}

#[cfg(not(feature = "local-embeddings"))]
fn create_fastembed(_config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    Err(crate::config::ConfigError::UnsupportedBackend("fastembed".to_string()).into())
}
