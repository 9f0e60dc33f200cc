use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingsConfig;
use crate::errors::{AppError, Result};

/// Request timeout for embedding API calls
const EMBEDDING_TIMEOUT_SECS: u64 = 30;

/// Maximum retries for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Maps text to a fixed-length vector. Ingestion and querying must share one
/// implementation so the embedding spaces match.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dim(&self) -> usize;
}

/// Cloud-based embedder using an OpenAI-shaped embeddings API.
pub struct CloudEmbedder {
    client: reqwest::Client,
    config: EmbeddingsConfig,
}

impl CloudEmbedder {
    pub fn new(config: EmbeddingsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBEDDING_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::EmbeddingError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let payload = serde_json::json!({
            "input": text,
            "model": "text-embedding-3-small"
        });

        let res = self
            .client
            .post(&self.config.model_api_url)
            .header("Authorization", format!("Bearer {}", self.config.model_api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::EmbeddingServiceTimeout {
                        timeout_secs: EMBEDDING_TIMEOUT_SECS,
                    }
                } else if e.is_connect() {
                    AppError::EmbeddingServiceUnavailable(format!("Connection failed: {e}"))
                } else {
                    AppError::EmbeddingError(format!("Request failed: {e}"))
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let error_body = res.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError(format!(
                "API error {status}: {error_body}"
            )));
        }

        let body: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AppError::EmbeddingError(format!("Parse error: {e}")))?;

        let embedding: Vec<f32> = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| AppError::EmbeddingError("Invalid response format".to_string()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if embedding.len() != self.config.embedding_dim {
            return Err(AppError::EmbeddingError(format!(
                "Dimension mismatch: got {}, expected {}",
                embedding.len(),
                self.config.embedding_dim
            )));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for CloudEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_error = AppError::EmbeddingError("Unknown error".to_string());

        for attempt in 0..MAX_RETRIES {
            match self.embed_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    last_error = e;

                    if attempt < MAX_RETRIES - 1 {
                        // Exponential backoff with jitter
                        let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                        let jitter = rand::random::<u64>() % (delay / 2);

                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = MAX_RETRIES,
                            delay_ms = delay + jitter,
                            error = %last_error,
                            "Embedding request failed, retrying"
                        );

                        tokio::time::sleep(Duration::from_millis(delay + jitter)).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    fn dim(&self) -> usize {
        self.config.embedding_dim
    }
}

/// Mock embedder for testing and development. Deterministic: the vector is
/// seeded from the text hash and normalized to unit length.
pub struct MockEmbedder {
    dim: usize,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut embedding: Vec<f32> = (0..self.dim)
            .map(|i| {
                // Simple PRNG based on seed and index
                let x = ((seed.wrapping_mul(i as u64 + 1)) % 1000) as f32 / 1000.0;
                x * 2.0 - 1.0
            })
            .collect();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
