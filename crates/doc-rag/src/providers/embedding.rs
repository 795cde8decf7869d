//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for an ordered batch of texts
    ///
    /// The output has one entry per input, in input order. A text that fails
    /// to embed, or whose vector has the wrong dimension, gets an empty vector
    /// at its position; the rest of the batch is unaffected.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let result = self.embed(text).await;
            embeddings.push(checked_embedding(self.name(), self.dimensions(), index, result));
        }
        embeddings
    }

    /// Embedding dimensions (e.g., 768 for nomic-embed-text)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Collapse a per-text embedding result into a vector or the empty sentinel
pub fn checked_embedding(
    provider: &str,
    dimensions: usize,
    index: usize,
    result: Result<Vec<f32>>,
) -> Vec<f32> {
    match result {
        Ok(vector) if vector.len() == dimensions => vector,
        Ok(vector) => {
            tracing::warn!(
                "{} returned {} dimensions for text {} (expected {}), dropping",
                provider,
                vector.len(),
                index,
                dimensions
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("{} failed to embed text {}: {}", provider, index, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::Error;

    /// Deterministic hashed bag-of-words embedder
    pub struct BagOfWordsEmbedder {
        pub dimensions: usize,
    }

    impl BagOfWordsEmbedder {
        pub fn new() -> Self {
            Self { dimensions: 32 }
        }

        pub fn vectorize(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; self.dimensions];
            for word in text.split_whitespace() {
                let word: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .collect();
                if word.is_empty() {
                    continue;
                }
                let bucket = word
                    .bytes()
                    .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
                    % self.dimensions;
                vector[bucket] += 1.0;
            }
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for BagOfWordsEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("EMBED_FAIL") {
                return Err(Error::embedding("poisoned text"));
            }
            Ok(self.vectorize(text))
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "bag-of-words"
        }
    }

    /// Embedder that fails every call
    pub struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::embedding("embedder offline"))
        }

        fn dimensions(&self) -> usize {
            32
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Embedder returning vectors of the wrong size
    pub struct WrongDimensionEmbedder;

    #[async_trait]
    impl EmbeddingProvider for WrongDimensionEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 3])
        }

        fn dimensions(&self) -> usize {
            32
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "wrong-dimension"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_batch_failure_is_positional() {
        let embedder = BagOfWordsEmbedder::new();
        let texts = vec![
            "pool opens at nine".to_string(),
            "EMBED_FAIL here".to_string(),
            "spa closes at eight".to_string(),
        ];

        let batch = embedder.embed_batch(&texts).await;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].len(), 32);
        assert!(batch[1].is_empty());
        assert_eq!(batch[2], embedder.vectorize("spa closes at eight"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_becomes_sentinel() {
        let batch = WrongDimensionEmbedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(batch, vec![Vec::<f32>::new(), Vec::new()]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(FailingEmbedder.embed_batch(&[]).await.is_empty());
    }
}
