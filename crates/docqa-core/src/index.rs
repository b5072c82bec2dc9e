//! Exact in-memory vector index.
//!
//! Stores `(chunk, vector)` pairs and answers k-nearest-neighbour queries
//! by brute force under squared Euclidean distance ([`squared_l2`]). The
//! index is immutable once built: replacing the corpus means building a new
//! index and swapping it in, never editing one in place. This lets many
//! readers search it concurrently without locking.
//!
//! # Ordering
//!
//! Results are sorted by ascending distance. The sort is stable, so equal
//! distances keep insertion order and the first indexed chunk wins.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::index::VectorIndex;
//! use docqa_core::models::Chunk;
//!
//! # fn chunk(i: usize) -> Chunk {
//! #     Chunk { id: i.to_string(), document_id: "d".into(), chunk_index: i,
//! #             text: format!("chunk {}", i), token_start: 0, token_count: 2, hash: String::new() }
//! # }
//! let index = VectorIndex::build(
//!     "test-model",
//!     2,
//!     vec![(chunk(0), vec![0.0, 0.0]), (chunk(1), vec![1.0, 1.0])],
//! )
//! .unwrap();
//!
//! let hits = index.search(&[1.0, 1.0], 1).unwrap();
//! assert_eq!(hits[0].chunk.chunk_index, 1);
//! assert_eq!(hits[0].distance, 0.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::embedding::squared_l2;
use crate::error::IndexError;
use crate::models::{Chunk, ScoredChunk};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Read-only nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from chunk/vector pairs, in insertion order.
    ///
    /// Every vector must have exactly `dims` components; `model` names the
    /// embedding model that produced them.
    pub fn build(
        model: impl Into<String>,
        dims: usize,
        pairs: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<Self, IndexError> {
        if dims == 0 {
            return Err(IndexError::ZeroDims);
        }
        let mut entries = Vec::with_capacity(pairs.len());
        for (chunk, vector) in pairs {
            if vector.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            entries.push(IndexEntry { chunk, vector });
        }
        Ok(Self {
            model: model.into(),
            dims,
            entries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over indexed chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Re-check the invariants `build` enforces. Indexes that come from
    /// deserialization have not been through `build`.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.dims == 0 {
            return Err(IndexError::ZeroDims);
        }
        match self.entries.iter().find(|e| e.vector.len() != self.dims) {
            Some(bad) => Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: bad.vector.len(),
            }),
            None => Ok(()),
        }
    }

    /// Fail unless this index was built from `model` with `dims` dimensions.
    pub fn ensure_compatible(&self, model: &str, dims: usize) -> Result<(), IndexError> {
        if self.model != model {
            return Err(IndexError::ModelMismatch {
                index_model: self.model.clone(),
                model: model.to_string(),
            });
        }
        if self.dims != dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: dims,
            });
        }
        Ok(())
    }

    /// Return the `k` chunks nearest to `query`, closest first.
    ///
    /// - `k == 0` or an empty index → empty result, never an error.
    /// - Fewer than `k` entries → every entry.
    /// - A query of the wrong dimensionality against a non-empty index →
    ///   [`IndexError::DimensionMismatch`].
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, squared_l2(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }
}
