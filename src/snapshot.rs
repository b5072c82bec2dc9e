//! On-disk index snapshots.
//!
//! Embedding a corpus is the slow, billable part of startup. When
//! `index.snapshot_path` is configured the built [`VectorIndex`] is written
//! to disk together with a fingerprint of everything that determined it:
//! the chunk texts (by hash), chunking parameters, embedding model and
//! dimensionality. A later build with an identical fingerprint loads the
//! snapshot instead of calling the embedding service again.
//!
//! Snapshots are JSON, written to a temporary file and renamed into place
//! so a crash never leaves a half-written snapshot behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use docqa_core::chunk::ChunkParams;
use docqa_core::index::VectorIndex;
use docqa_core::models::Chunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::SnapshotError;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    format_version: u32,
    fingerprint: &'a str,
    created_at: DateTime<Utc>,
    index: &'a VectorIndex,
}

#[derive(Deserialize)]
struct SnapshotIn {
    format_version: u32,
    fingerprint: String,
    created_at: DateTime<Utc>,
    index: VectorIndex,
}

/// SHA-256 over everything that determines the index contents.
pub fn fingerprint(chunks: &[Chunk], params: &ChunkParams, model: &str, dims: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FORMAT_VERSION.to_le_bytes());
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update((dims as u64).to_le_bytes());
    hasher.update((params.chunk_size() as u64).to_le_bytes());
    hasher.update((params.overlap() as u64).to_le_bytes());
    for sep in params.separators() {
        hasher.update(sep.as_bytes());
        hasher.update([0u8]);
    }
    for chunk in chunks {
        hasher.update(chunk.document_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Load the snapshot at `path` if it exists and matches `expected`.
///
/// Returns `Ok(None)` for a missing, outdated, or mismatched snapshot, and
/// [`SnapshotError::Invalid`] when the stored vectors disagree with the
/// recorded dimensionality.
pub fn load(path: &Path, expected: &str) -> Result<Option<VectorIndex>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let snapshot: SnapshotIn = serde_json::from_str(&content)?;

    if snapshot.format_version != FORMAT_VERSION || snapshot.fingerprint != expected {
        debug!(
            path = %path.display(),
            created_at = %snapshot.created_at,
            "snapshot is stale"
        );
        return Ok(None);
    }
    snapshot.index.validate()?;
    Ok(Some(snapshot.index))
}

/// Write `index` to `path` atomically.
pub fn save(path: &Path, fingerprint: &str, index: &VectorIndex) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let snapshot = SnapshotOut {
        format_version: FORMAT_VERSION,
        fingerprint,
        created_at: Utc::now(),
        index,
    };
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
