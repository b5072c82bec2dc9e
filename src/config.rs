//! TOML configuration.
//!
//! Every pipeline setting (data location, chunking, retrieval, provider
//! credentials, prompt, snapshot, server) is read from one file and
//! validated up front by [`load_config`]. Credentials named through
//! `api_key_env` are resolved here, once; providers receive them explicitly
//! and never read the environment themselves.
//!
//! ```toml
//! [data]
//! dir = "./data"
//!
//! [chunking]
//! chunk_size = 1024
//! overlap = 64
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use docqa_core::chunk::ChunkParams;
use docqa_core::prompt::{PromptTemplate, DEFAULT_ANSWER_FIELDS};
use serde::Deserialize;

use crate::http::{RetryPolicy, ServiceSettings};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory of JSON array files to index.
    pub dir: PathBuf,
    /// Directory holding `<ID>.pdf` companion files for answers.
    #[serde(default)]
    pub companion_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            separators: default_separators(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_overlap() -> usize {
    64
}
fn default_separators() -> Vec<String> {
    vec!["},".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

/// Settings shared by every external service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// `openai`, `gemini`, or `ollama`.
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    /// Per-attempt HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// Upper bound for one provider call including every retry, plus one
    /// second of scheduling slack.
    pub fn call_timeout(&self) -> Duration {
        self.retry_policy().call_budget(self.timeout()) + Duration::from_secs(1)
    }

    fn default_base_url(&self) -> &'static str {
        match self.provider.as_str() {
            "gemini" => "https://generativelanguage.googleapis.com",
            "ollama" => "http://localhost:11434",
            _ => "https://api.openai.com",
        }
    }

    fn default_api_key_env(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "openai" => Some("OPENAI_API_KEY"),
            "gemini" => Some("GOOGLE_API_KEY"),
            _ => None,
        }
    }

    fn requires_api_key(&self) -> bool {
        self.provider != "ollama"
    }

    /// Fill `api_key` from the environment if it was not given inline.
    fn resolve_api_key(&mut self) {
        if self.api_key.is_some() {
            return;
        }
        let var = self
            .api_key_env
            .clone()
            .or_else(|| self.default_api_key_env().map(str::to_string));
        if let Some(var) = var {
            self.api_key = std::env::var(&var).ok().filter(|k| !k.is_empty());
        }
    }

    /// Connection settings handed to a provider.
    pub fn settings(&self) -> Result<ServiceSettings> {
        if self.requires_api_key() && self.api_key.is_none() {
            bail!(
                "provider '{}' needs an API key (set api_key or api_key_env)",
                self.provider
            );
        }
        Ok(ServiceSettings {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.default_base_url().to_string()),
            timeout: self.timeout(),
            retry: self.retry_policy(),
        })
    }

    fn validate(&self, section: &str) -> Result<()> {
        match self.provider.as_str() {
            "openai" | "gemini" | "ollama" => {}
            other => bail!(
                "Unknown {} provider: '{}'. Must be openai, gemini, or ollama.",
                section,
                other
            ),
        }
        if self.model.trim().is_empty() {
            bail!("{}.model must not be empty", section);
        }
        if self.timeout_secs == 0 {
            bail!("{}.timeout_secs must be > 0", section);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(flatten)]
    pub service: ServiceConfig,
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(flatten)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    /// Enumerated answer fields for the built-in template.
    #[serde(default)]
    pub answer_fields: Option<Vec<String>>,
    /// Full template override; must contain `{context_str}` then `{query_str}`.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Where to cache the built index between runs.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    pub fn chunk_params(&self) -> Result<ChunkParams> {
        ChunkParams::new(
            self.chunking.chunk_size,
            self.chunking.overlap,
            self.chunking.separators.clone(),
        )
        .with_context(|| "Invalid [chunking] settings")
    }

    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        if let Some(text) = &self.prompt.template {
            return PromptTemplate::new(text.clone()).with_context(|| "Invalid prompt.template");
        }
        Ok(match &self.prompt.answer_fields {
            Some(fields) => PromptTemplate::with_answer_fields(fields),
            None => PromptTemplate::with_answer_fields(DEFAULT_ANSWER_FIELDS),
        })
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config.chunk_params()?;
    config.prompt_template()?;

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    config.embedding.service.validate("embedding")?;
    config.generation.service.validate("generation")?;
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if let Some(snapshot) = &config.index.snapshot_path {
        if resolve_path(snapshot).starts_with(resolve_path(&config.data.dir)) {
            bail!(
                "index.snapshot_path ({}) must not be inside data.dir ({}); \
                 every file there is loaded as data",
                snapshot.display(),
                config.data.dir.display()
            );
        }
    }

    config.embedding.service.resolve_api_key();
    config.generation.service.resolve_api_key();

    Ok(config)
}

/// Absolute form of `path` with `.` dropped and `..` folded, without
/// touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Like [`normalize_path`], but follows symlinks for whatever part of the
/// path already exists.
fn resolve_path(path: &Path) -> PathBuf {
    let lexical = normalize_path(path);
    if let Ok(real) = lexical.canonicalize() {
        return real;
    }
    match (lexical.parent(), lexical.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(lexical),
        _ => lexical,
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[data]
dir = "./data"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768

[generation]
provider = "ollama"
model = "llama3"
"#;

    #[test]
    fn test_minimal_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1024);
        assert_eq!(cfg.chunking.overlap, 64);
        assert_eq!(cfg.chunking.separators, vec!["},".to_string()]);
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.embedding.batch_size, 64);
        assert_eq!(cfg.embedding.service.max_retries, 2);
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        let settings = cfg.embedding.service.settings().unwrap();
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(cfg.prompt_template().unwrap().as_str().contains("ID: Book ID"));
    }

    #[test]
    fn test_inline_api_key_and_base_url() {
        let cfg = parse_config(
            r#"
[data]
dir = "d"
[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
api_key = "sk-test"
base_url = "http://127.0.0.1:9999"
[generation]
provider = "gemini"
model = "gemini-1.5-flash-latest"
api_key = "g-test"
temperature = 0.1
"#,
        )
        .unwrap();
        let s = cfg.embedding.service.settings().unwrap();
        assert_eq!(s.api_key.as_deref(), Some("sk-test"));
        assert_eq!(s.base_url, "http://127.0.0.1:9999");
        let g = cfg.generation.service.settings().unwrap();
        assert_eq!(g.base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(cfg.generation.temperature, Some(0.1));
    }

    #[test]
    fn test_api_key_from_named_env_var() {
        std::env::set_var("DOCQA_TEST_KEY_FROM_ENV", "from-env");
        let cfg = parse_config(&MINIMAL.replace(
            "provider = \"ollama\"\nmodel = \"llama3\"",
            "provider = \"openai\"\nmodel = \"gpt-4o-mini\"\napi_key_env = \"DOCQA_TEST_KEY_FROM_ENV\"",
        ))
        .unwrap();
        assert_eq!(
            cfg.generation.service.api_key.as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn test_missing_key_reported_when_settings_requested() {
        let cfg = parse_config(&MINIMAL.replace(
            "provider = \"ollama\"\nmodel = \"llama3\"",
            "provider = \"openai\"\nmodel = \"gpt-4o-mini\"\napi_key_env = \"DOCQA_TEST_UNSET_VARIABLE\"",
        ))
        .unwrap();
        let err = cfg.generation.service.settings().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_overlap = format!("{}\n[chunking]\nchunk_size = 10\noverlap = 10\n", MINIMAL);
        assert!(parse_config(&bad_overlap).is_err());

        let bad_k = format!("{}\n[retrieval]\ntop_k = 0\n", MINIMAL);
        assert!(parse_config(&bad_k).is_err());

        let bad_provider = MINIMAL.replace(
            "provider = \"ollama\"\nmodel = \"llama3\"",
            "provider = \"bard\"\nmodel = \"x\"",
        );
        let err = parse_config(&bad_provider).unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));

        let bad_template = format!("{}\n[prompt]\ntemplate = \"no placeholders\"\n", MINIMAL);
        assert!(parse_config(&bad_template).is_err());
    }

    #[test]
    fn test_snapshot_inside_data_dir_rejected() {
        let cwd = std::env::current_dir().unwrap();
        let absolute = cwd.join("data").join("index.json");
        for snapshot in [
            "./data/index.json".to_string(),
            "data/index.json".to_string(),
            "./data/../data/cache/index.json".to_string(),
            absolute.display().to_string(),
        ] {
            let cfg = format!("{}\n[index]\nsnapshot_path = \"{}\"\n", MINIMAL, snapshot);
            let err = parse_config(&cfg).unwrap_err();
            assert!(
                err.to_string().contains("must not be inside data.dir"),
                "{} was accepted",
                snapshot
            );
        }
    }

    #[test]
    fn test_snapshot_outside_data_dir_accepted() {
        for snapshot in ["./.docqa/index.json", "data-cache/index.json", "data/../index.json"] {
            let cfg = format!("{}\n[index]\nsnapshot_path = \"{}\"\n", MINIMAL, snapshot);
            assert!(parse_config(&cfg).is_ok(), "{} was rejected", snapshot);
        }
    }

    #[test]
    fn test_call_timeout_spans_retries() {
        let cfg = MINIMAL.replace(
            "model = \"llama3\"",
            "model = \"llama3\"\ntimeout_secs = 2\nmax_retries = 2\nbackoff_ms = 500",
        );
        let config = parse_config(&cfg).unwrap();
        let generation = &config.generation.service;
        assert_eq!(generation.timeout(), Duration::from_secs(2));
        // 3 × 2s + 0.5s + 1s backoff + 1s slack
        assert_eq!(generation.call_timeout(), Duration::from_millis(8500));
        assert!(config.embedding.service.call_timeout() > config.embedding.service.timeout());
    }

    #[test]
    fn test_custom_answer_fields() {
        let cfg = format!("{}\n[prompt]\nanswer_fields = [\"Name\", \"ID\"]\n", MINIMAL);
        let tpl = parse_config(&cfg).unwrap().prompt_template().unwrap();
        assert!(tpl.as_str().contains("1. Name\n2. ID\n"));
    }
}
