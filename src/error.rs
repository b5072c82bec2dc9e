//! Error taxonomy for loading, building, and querying.
//!
//! Build errors are fatal to the assistant: a failed first build leaves it
//! in the `Failed` phase for good. Query errors are local to one call.

use std::path::PathBuf;

use docqa_core::error::{EmbeddingError, GenerationError, IndexError};
use thiserror::Error;

/// Failure reading the document directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Failure turning a document directory into a searchable index.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("an index build is already in progress")]
    AlreadyBuilding,

    #[error("the assistant failed to start and cannot be rebuilt: {0}")]
    Failed(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("embedding failed while building the index: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index build failed: {0}")]
    Index(#[from] IndexError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Failure answering one question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the document index is not ready yet")]
    NotReady,

    #[error("query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Failure reading or writing an index snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("snapshot contents: {0}")]
    Invalid(#[from] IndexError),
}
