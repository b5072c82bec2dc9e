//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helpers for validating provider output and for the
//! distance metric used by the vector index.
//!
//! Concrete provider implementations (OpenAI, Gemini, Ollama) live in the
//! `docqa` app crate.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Trait for embedding providers.
///
/// A provider turns text into fixed-dimension vectors through an external
/// service. All vectors produced by one provider share [`dims`](Self::dims)
/// and come from [`model_name`](Self::model_name); the vector index records
/// both and refuses to mix models.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    ///
    /// The default implementation sends a one-element batch.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(v) if vectors.is_empty() => Ok(v),
            _ => Err(EmbeddingError::MalformedResponse {
                provider: self.model_name().to_string(),
                message: "expected exactly one embedding".to_string(),
            }),
        }
    }
}

/// Check that a provider returned one vector of `dims` floats per input.
pub fn validate_embeddings(
    provider: &str,
    expected_count: usize,
    dims: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::MalformedResponse {
            provider: provider.to_string(),
            message: format!(
                "expected {} embeddings, got {}",
                expected_count,
                vectors.len()
            ),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Squared Euclidean (L2) distance between two vectors of equal length.
///
/// This is the single metric used by the vector index. The square root is
/// skipped because it does not change the ordering.
///
/// # Example
///
/// ```rust
/// use docqa_core::embedding::squared_l2;
///
/// assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
/// assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
/// ```
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
