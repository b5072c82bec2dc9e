//! Core data models that flow through the answering pipeline.
//!
//! A [`Document`] is one element of a JSON array file, a [`Chunk`] is a
//! token-bounded slice of one document, and a [`ScoredChunk`] is a chunk
//! returned from the vector index together with its distance to the query.

use serde::{Deserialize, Serialize};

/// One logical document: a single JSON array element, re-serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// `"<file name>#<entry index>"`.
    pub id: String,
    /// File name the document was read from.
    pub source: String,
    /// Position of the element inside the file's top-level array.
    pub entry_index: usize,
    /// Canonical JSON text of the element.
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, entry_index: usize, text: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: format!("{}#{}", source, entry_index),
            source,
            entry_index,
            text: text.into(),
        }
    }
}

/// A contiguous token range of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUIDv5 derived from the document ID and chunk index.
    pub id: String,
    /// ID of the [`Document`] this chunk was cut from.
    pub document_id: String,
    /// Position of the chunk within its document, starting at 0.
    pub chunk_index: usize,
    pub text: String,
    /// Index of the first token of this chunk in the document's token sequence.
    pub token_start: usize,
    pub token_count: usize,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// A chunk returned by [`VectorIndex::search`](crate::index::VectorIndex::search).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query vector. Lower is closer.
    pub distance: f32,
}
