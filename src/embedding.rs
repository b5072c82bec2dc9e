//! Embedding provider implementations.
//!
//! Concrete [`EmbeddingProvider`]s for the supported services:
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings`, bearer-token auth.
//! - **[`GeminiEmbedder`]**: `POST /v1beta/models/{model}:batchEmbedContents`, `x-goog-api-key` auth.
//! - **[`OllamaEmbedder`]**: `POST /api/embed` on a local Ollama instance, no auth.
//!
//! All three share the retry strategy in [`crate::http`] and validate that
//! the service returned one vector of the configured dimensionality per
//! input text.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in config:
//!
//! ```rust,no_run
//! # use docqa::config::load_config;
//! # use docqa::embedding::create_embedder;
//! let config = load_config(std::path::Path::new("docqa.toml")).unwrap();
//! let embedder = create_embedder(&config.embedding).unwrap();
//! println!("{} ({} dims)", embedder.model_name(), embedder.dims());
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docqa_core::embedding::{validate_embeddings, EmbeddingProvider};
use docqa_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;
use crate::http::{build_client, join_url, post_json, CallFailure, ServiceSettings};

/// Instantiate the embedding provider selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let settings = config.service.settings()?;
    let dims = config.dims;
    let provider: Arc<dyn EmbeddingProvider> = match config.service.provider.as_str() {
        "openai" => Arc::new(OpenAIEmbedder::new(settings, dims)?),
        "gemini" => Arc::new(GeminiEmbedder::new(settings, dims)?),
        "ollama" => Arc::new(OllamaEmbedder::new(settings, dims)?),
        other => bail!("Unknown embedding provider: {}", other),
    };
    Ok(provider)
}

fn to_embedding_error(
    provider: &str,
    settings: &ServiceSettings,
    failure: CallFailure,
) -> EmbeddingError {
    let provider = provider.to_string();
    match failure {
        CallFailure::Status { status, body } => EmbeddingError::Http {
            provider,
            status,
            message: body,
        },
        CallFailure::Auth { body, .. } => EmbeddingError::Auth {
            provider,
            message: body,
        },
        CallFailure::Timeout => EmbeddingError::Timeout {
            provider,
            secs: settings.timeout.as_secs(),
        },
        CallFailure::Transport(message) => EmbeddingError::Transport { provider, message },
        CallFailure::Malformed(message) => EmbeddingError::MalformedResponse { provider, message },
    }
}

fn malformed(provider: &str, message: &str) -> EmbeddingError {
    EmbeddingError::MalformedResponse {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

/// Read a JSON array of numbers as an `f32` vector.
fn parse_vector(provider: &str, value: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    value
        .as_array()
        .ok_or_else(|| malformed(provider, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| malformed(provider, "embedding contains a non-number"))
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Sends whole batches in one `POST /v1/embeddings` call and restores input
/// order from each item's `index` field.
pub struct OpenAIEmbedder {
    settings: ServiceSettings,
    dims: usize,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// Returns an error if no API key was configured or the HTTP client
    /// cannot be built.
    pub fn new(settings: ServiceSettings, dims: usize) -> Result<Self> {
        if settings.api_key.is_none() {
            bail!("OpenAI embedding provider requires an API key");
        }
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            dims,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.settings.model,
            "input": texts,
        });
        let headers = [(
            "Authorization",
            format!("Bearer {}", self.settings.api_key.as_deref().unwrap_or_default()),
        )];
        let url = join_url(&self.settings.base_url, "/v1/embeddings");

        let json = post_json(&self.client, &url, &headers, &body, self.settings.retry)
            .await
            .map_err(|f| to_embedding_error("openai", &self.settings, f))?;

        let vectors = parse_openai_response(&json)?;
        validate_embeddings("openai", texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed("openai", "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| malformed("openai", "missing embedding"))?;
        indexed.push((index, parse_vector("openai", embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Gemini Provider ============

/// Embedding provider using the Google Gemini API.
pub struct GeminiEmbedder {
    settings: ServiceSettings,
    dims: usize,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(settings: ServiceSettings, dims: usize) -> Result<Self> {
        if settings.api_key.is_none() {
            bail!("Gemini embedding provider requires an API key");
        }
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            dims,
            client,
        })
    }
}

/// Gemini model names may be given with or without the `models/` prefix.
pub(crate) fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = gemini_model_path(&self.settings.model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": model,
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });
        let headers = [(
            "x-goog-api-key",
            self.settings.api_key.clone().unwrap_or_default(),
        )];
        let url = join_url(
            &self.settings.base_url,
            &format!("/v1beta/{}:batchEmbedContents", model),
        );

        let json = post_json(&self.client, &url, &headers, &body, self.settings.retry)
            .await
            .map_err(|f| to_embedding_error("gemini", &self.settings, f))?;

        let vectors = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed("gemini", "missing embeddings array"))?
            .iter()
            .map(|e| {
                let values = e
                    .get("values")
                    .ok_or_else(|| malformed("gemini", "missing values"))?;
                parse_vector("gemini", values)
            })
            .collect::<Result<Vec<_>, _>>()?;

        validate_embeddings("gemini", texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    settings: ServiceSettings,
    dims: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(settings: ServiceSettings, dims: usize) -> Result<Self> {
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            dims,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.settings.model,
            "input": texts,
        });
        let url = join_url(&self.settings.base_url, "/api/embed");

        let json = post_json(&self.client, &url, &[], &body, self.settings.retry)
            .await
            .map_err(|f| to_embedding_error("ollama", &self.settings, f))?;

        let vectors = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed("ollama", "missing embeddings array"))?
            .iter()
            .map(|e| parse_vector("ollama", e))
            .collect::<Result<Vec<_>, _>>()?;

        validate_embeddings("ollama", texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}
