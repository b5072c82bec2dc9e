//! Answer generator implementations.
//!
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions` with a single user message.
//! - **[`GeminiGenerator`]**: `POST /v1beta/models/{model}:generateContent`.
//! - **[`OllamaGenerator`]**: `POST /api/generate` with streaming disabled.
//!
//! Completions are returned exactly as the service produced them. An empty
//! completion is reported as [`GenerationError::Empty`].

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docqa_core::error::GenerationError;
use docqa_core::generation::AnswerGenerator;

use crate::config::GenerationConfig;
use crate::embedding::gemini_model_path;
use crate::http::{build_client, join_url, post_json, CallFailure, ServiceSettings};

/// Instantiate the generator selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn AnswerGenerator>> {
    let settings = config.service.settings()?;
    let temperature = config.temperature;
    let generator: Arc<dyn AnswerGenerator> = match config.service.provider.as_str() {
        "openai" => Arc::new(OpenAIGenerator::new(settings, temperature)?),
        "gemini" => Arc::new(GeminiGenerator::new(settings, temperature)?),
        "ollama" => Arc::new(OllamaGenerator::new(settings, temperature)?),
        other => bail!("Unknown generation provider: {}", other),
    };
    Ok(generator)
}

fn to_generation_error(
    provider: &str,
    settings: &ServiceSettings,
    failure: CallFailure,
) -> GenerationError {
    let provider = provider.to_string();
    match failure {
        CallFailure::Status { status, body } => GenerationError::Http {
            provider,
            status,
            message: body,
        },
        CallFailure::Auth { body, .. } => GenerationError::Auth {
            provider,
            message: body,
        },
        CallFailure::Timeout => GenerationError::Timeout {
            provider,
            secs: settings.timeout.as_secs(),
        },
        CallFailure::Transport(message) => GenerationError::Transport { provider, message },
        CallFailure::Malformed(message) => GenerationError::MalformedResponse { provider, message },
    }
}

fn malformed(provider: &str, message: &str) -> GenerationError {
    GenerationError::MalformedResponse {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

fn non_empty(provider: &str, text: String) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::Empty {
            provider: provider.to_string(),
        });
    }
    Ok(text)
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    settings: ServiceSettings,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(settings: ServiceSettings, temperature: Option<f32>) -> Result<Self> {
        if settings.api_key.is_none() {
            bail!("OpenAI generation provider requires an API key");
        }
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            temperature,
            client,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        let headers = [(
            "Authorization",
            format!("Bearer {}", self.settings.api_key.as_deref().unwrap_or_default()),
        )];
        let url = join_url(&self.settings.base_url, "/v1/chat/completions");

        let json = post_json(&self.client, &url, &headers, &body, self.settings.retry)
            .await
            .map_err(|f| to_generation_error("openai", &self.settings, f))?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| malformed("openai", "missing choices[0].message.content"))?;
        non_empty("openai", text.to_string())
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    settings: ServiceSettings,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(settings: ServiceSettings, temperature: Option<f32>) -> Result<Self> {
        if settings.api_key.is_none() {
            bail!("Gemini generation provider requires an API key");
        }
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            temperature,
            client,
        })
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = serde_json::json!({ "temperature": t });
        }
        let headers = [(
            "x-goog-api-key",
            self.settings.api_key.clone().unwrap_or_default(),
        )];
        let url = join_url(
            &self.settings.base_url,
            &format!(
                "/v1beta/{}:generateContent",
                gemini_model_path(&self.settings.model)
            ),
        );

        let json = post_json(&self.client, &url, &headers, &body, self.settings.retry)
            .await
            .map_err(|f| to_generation_error("gemini", &self.settings, f))?;

        let parts = json
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| malformed("gemini", "missing candidates[0].content.parts"))?;
        // A candidate may split its text over several parts.
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();
        non_empty("gemini", text)
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    settings: ServiceSettings,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(settings: ServiceSettings, temperature: Option<f32>) -> Result<Self> {
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            temperature,
            client,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        let url = join_url(&self.settings.base_url, "/api/generate");

        let json = post_json(&self.client, &url, &[], &body, self.settings.retry)
            .await
            .map_err(|f| to_generation_error("ollama", &self.settings, f))?;

        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| malformed("ollama", "missing response"))?;
        non_empty("ollama", text.to_string())
    }
}
