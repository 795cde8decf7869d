//! Ollama embedding provider with retry logic

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::embedding::{checked_embedding, EmbeddingProvider};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    /// HTTP client
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    /// Maximum retries per text
    max_retries: u32,
    /// Concurrent requests per batch
    parallelism: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
            parallelism: config.parallelism(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::embedding("Unknown error")))
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.retry_request(|| self.request_embedding(text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let requests: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(index, text)| async move {
                checked_embedding(self.name(), self.dimensions, index, self.embed(text).await)
            })
            .collect();

        // `buffered` keeps results in input order
        stream::iter(requests)
            .buffered(self.parallelism)
            .collect()
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> EmbeddingConfig {
        EmbeddingConfig {
            base_url: "http://127.0.0.1:1/".to_string(),
            timeout_secs: 2,
            max_retries: 0,
            parallel_requests: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let embedder = OllamaEmbedder::new(&unreachable_config()).unwrap();
        assert_eq!(embedder.base_url, "http://127.0.0.1:1");
        assert_eq!(embedder.model(), "nomic-embed-text");
        assert_eq!(embedder.dimensions(), 768);
    }

    #[tokio::test]
    async fn test_health_check_unreachable_is_false() {
        let embedder = OllamaEmbedder::new(&unreachable_config()).unwrap();
        assert!(!embedder.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_batch_yields_sentinels_in_order() {
        let embedder = OllamaEmbedder::new(&unreachable_config()).unwrap();
        let texts: Vec<String> = (0..3).map(|i| format!("text {}", i)).collect();

        let batch = embedder.embed_batch(&texts).await;
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|v| v.is_empty()));
    }
}
