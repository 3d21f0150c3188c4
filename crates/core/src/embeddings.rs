use crate::error::RetrievalError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

const NGRAM_MODEL: &str = "char-trigram-fnv1a";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps text to a dense vector of a fixed dimension.
///
/// Implementations must be deterministic for a fixed configuration, and
/// `embed_many` must agree with calling `embed` on each input in order.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    /// Identity of the model recorded alongside persisted vectors.
    fn model(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        (**self).embed(text)
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        (**self).embed_many(texts)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        NGRAM_MODEL
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        if self.dimensions == 0 {
            return Err(RetrievalError::Embedding(
                "embedder configured with zero dimensions".to_string(),
            ));
        }

        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingEndpointConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Embedder backed by an Ollama-compatible `/api/embed` endpoint.
///
/// The blocking client is built once and reused for every batch.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    config: EmbeddingEndpointConfig,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingEndpointConfig) -> Result<Self, RetrievalError> {
        let client = run_blocking(|| {
            Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|error| RetrievalError::Embedding(error.to_string()))
        })?;
        Ok(Self { config, client })
    }

    fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        run_blocking(|| self.request_batch_blocking(texts))
    }

    fn request_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let url = format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'));
        debug!(url = %url, batch = texts.len(), "requesting embeddings");

        let mut request = self.client.post(&url).json(&EmbedRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .map_err(|error| RetrievalError::Embedding(format!("{url} unreachable: {error}")))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Embedding(format!(
                "embedding request to {} returned {}",
                url,
                response.status()
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .map_err(|error| RetrievalError::Embedding(error.to_string()))?;

        payload_to_vectors(payload, texts.len(), self.config.dimensions)
    }
}

/// Runs blocking HTTP work without stalling an async caller.
///
/// On a multi-threaded runtime the current worker is handed off with
/// `block_in_place`. A current-thread runtime cannot do that, so the work
/// moves to a scoped thread instead. Outside any runtime it runs inline.
fn run_blocking<T, F>(work: F) -> Result<T, RetrievalError>
where
    T: Send,
    F: FnOnce() -> Result<T, RetrievalError> + Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        Ok(_) => std::thread::scope(|scope| {
            scope.spawn(work).join().unwrap_or_else(|_| {
                Err(RetrievalError::Embedding(
                    "embedding worker thread panicked".to_string(),
                ))
            })
        }),
        Err(_) => work(),
    }
}

impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self.request_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("endpoint returned no embedding".to_string()))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts)
    }
}

fn payload_to_vectors(
    payload: EmbedResponse,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, RetrievalError> {
    check_batch(payload.embeddings, expected_count, dimensions)
}

/// Rejects a model output that does not hold exactly one `dimensions`-long
/// vector per input.
pub(crate) fn check_batch(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, RetrievalError> {
    if vectors.len() != expected_count {
        return Err(RetrievalError::Embedding(format!(
            "model returned {} embeddings for {} inputs",
            vectors.len(),
            expected_count
        )));
    }

    if let Some(bad) = vectors.iter().find(|embedding| embedding.len() != dimensions) {
        return Err(RetrievalError::Embedding(format!(
            "model returned a {}-dimensional embedding, configured for {}",
            bad.len(),
            dimensions
        )));
    }

    Ok(vectors)
}
