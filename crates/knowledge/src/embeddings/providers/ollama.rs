//! Ollama embedding provider.
//!
//! Provides semantic embeddings via Ollama's local API using models like
//! nomic-embed-text. Requests carry a timeout and are retried with bounded
//! exponential backoff.

use crate::embeddings::provider::EmbeddingProvider;
use ragdesk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API endpoint for embeddings
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using the local API.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Ollama API base URL
    base_url: String,
    /// Model name (e.g., "nomic-embed-text")
    model: String,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Request payload for the Ollama embeddings API.
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

/// Response from the Ollama embeddings API.
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder.
    pub fn new(model: String, dimensions: usize, endpoint: Option<&str>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Llm(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = endpoint
            .map(|e| e.to_string())
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url,
            model,
            dimensions,
        })
    }

    /// Embed a single text, retrying transient failures with backoff.
    async fn embed_with_retry(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut last_error = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.client.post(&url).json(&request).send().await {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
                        AppError::Llm(format!("Failed to parse embedding response: {}", e))
                    })?;

                    if parsed.embedding.len() != self.dimensions {
                        return Err(AppError::Llm(format!(
                            "Embedding dimension mismatch: expected {}, got {}",
                            self.dimensions,
                            parsed.embedding.len()
                        )));
                    }

                    return Ok(parsed.embedding);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    last_error = format!("Ollama API error ({}): {}", status, body);

                    // Client errors will not improve on retry
                    if status.is_client_error() {
                        return Err(AppError::Llm(last_error));
                    }
                }
                Err(e) => {
                    last_error = format!("Embedding request failed: {}", e);
                }
            }

            if attempt < MAX_RETRIES {
                tracing::warn!(
                    "Embedding attempt {}/{} failed, retrying in {}ms: {}",
                    attempt,
                    MAX_RETRIES,
                    backoff_ms,
                    last_error
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
            }
        }

        Err(AppError::Llm(last_error))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            embeddings.push(self.embed_with_retry(text).await?);
        }

        tracing::debug!("Embedded {} texts via Ollama", embeddings.len());

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OllamaEmbedder::new("nomic-embed-text".to_string(), 768, None).unwrap();
        assert_eq!(embedder.provider_name(), "ollama");
        assert_eq!(embedder.model_name(), "nomic-embed-text");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[test]
    fn test_custom_endpoint() {
        let embedder =
            OllamaEmbedder::new("nomic-embed-text".to_string(), 768, Some("http://host:9999"))
                .unwrap();
        assert_eq!(embedder.base_url, "http://host:9999");
    }
}
