//! Local sentence embeddings with `all-MiniLM-L6-v2`, run in-process.
//!
//! The model files are fetched into the cache directory on first use.

use crate::embeddings::{check_batch, Embedder};
use crate::error::RetrievalError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

pub const FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";
pub const FASTEMBED_DIMENSIONS: usize = 384;

const BATCH_SIZE: usize = 64;

pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn new() -> Result<Self, RetrievalError> {
        Self::with_cache_dir(None)
    }

    pub fn with_cache_dir(cache_dir: Option<PathBuf>) -> Result<Self, RetrievalError> {
        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(cache_dir) = cache_dir {
            options = options.with_cache_dir(cache_dir);
        }

        let model = TextEmbedding::try_new(options).map_err(|error| {
            RetrievalError::Embedding(format!("cannot load {FASTEMBED_MODEL}: {error}"))
        })?;
        info!(model = FASTEMBED_MODEL, "local embedding model ready");

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        FASTEMBED_DIMENSIONS
    }

    fn model(&self) -> &str {
        FASTEMBED_MODEL
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self.embed_many(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("model returned no embedding".to_string()))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self
            .model
            .lock()
            .map_err(|_| RetrievalError::Embedding("embedding model lock poisoned".to_string()))?;
        let vectors = model
            .embed(texts.to_vec(), Some(BATCH_SIZE))
            .map_err(|error| RetrievalError::Embedding(error.to_string()))?;

        check_batch(vectors, texts.len(), FASTEMBED_DIMENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::{FastEmbedEmbedder, FASTEMBED_DIMENSIONS};
    use crate::embeddings::Embedder;
    use crate::index::squared_l2;

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    fn similar_sentences_land_close_together() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        let texts = vec![
            "A cosy cafe serving espresso and cakes".to_string(),
            "Coffee shop with pastries".to_string(),
            "Car tyre repair garage".to_string(),
        ];

        let vectors = embedder.embed_many(&texts).unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|vector| vector.len() == FASTEMBED_DIMENSIONS));
        assert!(squared_l2(&vectors[0], &vectors[1]) < squared_l2(&vectors[0], &vectors[2]));
        assert_eq!(embedder.embed(&texts[1]).unwrap().len(), FASTEMBED_DIMENSIONS);
    }

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2"]
    fn empty_batch_needs_no_inference() {
        let embedder = FastEmbedEmbedder::new().unwrap();
        assert!(embedder.embed_many(&[]).unwrap().is_empty());
    }
}
