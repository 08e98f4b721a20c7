// In-process embedding backends


use sha2::{Digest, Sha256};

use super::Embedder;
use crate::Result;
#[cfg(feature = "local-embeddings")]
use crate::MemoryError;

/// Deterministic bag-of-words embedder.
///
/// Each lowercased word is hashed into one of `dimension` buckets with a
/// signed weight and the result is L2-normalised. Texts sharing words land
/// close together, which is enough for offline use and tests; it carries no
/// semantic knowledge.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("hashing-{}", dimension),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for HashEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text.split_whitespace() {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

            if let Some(slot) = embedding.get_mut(bucket) {
                *slot += sign;
            }
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Sentence-embedding model run in-process through fastembed
/// (all-MiniLM-L6-v2, 384 dimensions).
#[cfg(feature = "local-embeddings")]
pub struct FastEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
}

#[cfg(feature = "local-embeddings")]
impl FastEmbedder {
    pub const MODEL_NAME: &'static str = "all-MiniLM-L6-v2";

    #[inline]
    pub fn new() -> Result<Self> {
        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| MemoryError::embedding(format!("Failed to load model: {}", e)))?;

        tracing::info!("Loaded local embedding model {}", Self::MODEL_NAME);
        Ok(Self {
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "local-embeddings")]
impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| MemoryError::embedding("Model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self.model.lock().map_err(|_| MemoryError::LockPoisoned)?;
        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| MemoryError::embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(MemoryError::embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    #[inline]
    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}
