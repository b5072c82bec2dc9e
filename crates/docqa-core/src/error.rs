//! Error types shared by the core pipeline stages.

use thiserror::Error;

/// Invalid chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },

    #[error("chunk separators must not be empty strings")]
    EmptySeparator,
}

/// Failure talking to, or interpreting the answer of, an embedding service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbeddingError {
    #[error("embedding request to {provider} failed with HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("embedding provider {provider} rejected the credentials: {message}")]
    Auth { provider: String, message: String },

    #[error("embedding request to {provider} timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("embedding request to {provider} could not be sent: {message}")]
    Transport { provider: String, message: String },

    #[error("malformed embedding response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure talking to, or interpreting the answer of, a generative service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request to {provider} failed with HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("generation provider {provider} rejected the credentials: {message}")]
    Auth { provider: String, message: String },

    #[error("generation request to {provider} timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("generation request to {provider} could not be sent: {message}")]
    Transport { provider: String, message: String },

    #[error("malformed generation response from {provider}: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("{provider} returned an empty completion")]
    Empty { provider: String },
}

/// Vector index construction and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index dimensionality must be > 0")]
    ZeroDims,

    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with model '{index_model}', but vectors come from '{model}'")]
    ModelMismatch { index_model: String, model: String },
}

/// Invalid prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("prompt template contains the {0} placeholder more than once")]
    DuplicatePlaceholder(&'static str),

    #[error("prompt template must place {{context_str}} before {{query_str}}")]
    PlaceholderOrder,
}
