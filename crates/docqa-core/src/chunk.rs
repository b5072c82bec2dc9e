//! Token-window text chunker with overlap and preferred break points.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` tokens, with
//! exactly `overlap` tokens shared between consecutive chunks of the same
//! document. Documents loaded from JSON arrays serialize as one long line,
//! so instead of paragraph boundaries the splitter looks for configurable
//! separator strings (by default `"},"`, the end of a nested object) to
//! avoid cutting a JSON object in half.
//!
//! Each chunk receives a deterministic UUID derived from its document ID
//! and index, plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Tokenize the document with a [`Tokenizer`].
//! 2. Open a window of `chunk_size` tokens at `start`.
//! 3. If the window does not reach the end of the document, search its back
//!    half for the last token boundary preceded by a separator, trying
//!    separators in priority order. Fall back to a hard cut at the window end.
//! 4. Emit the chunk and start the next window `overlap` tokens before the cut.
//! 5. Stop once a chunk reaches the last token.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::{split_text, ChunkParams, LexicalTokenizer};
//!
//! let params = ChunkParams::new(500, 10, vec!["},".to_string()]).unwrap();
//! let chunks = split_text("a.json#0", r#"{"title":"A"}"#, &params, &LexicalTokenizer);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ChunkError;
use crate::models::{Chunk, Document};

/// Splits text into tokens.
///
/// Implementations must return contiguous, non-empty slices that together
/// cover the whole input, so that `tokens.concat() == text`.
pub trait Tokenizer: Send + Sync {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// Lexical tokenizer: runs of word characters, runs of whitespace, and
/// single punctuation characters.
///
/// `{"title": "A"}` tokenizes as `{`, `"`, `title`, `"`, `:`, ` `, `"`, `A`,
/// `"`, `}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalTokenizer;

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Space,
    Punct,
}

fn classify(c: char) -> CharClass {
    if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else if c.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Punct
    }
}

impl Tokenizer for LexicalTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut tokens = Vec::new();
        let mut start = 0;
        let mut prev: Option<CharClass> = None;

        for (i, c) in text.char_indices() {
            let class = classify(c);
            let boundary = match prev {
                None => false,
                Some(CharClass::Punct) => true,
                Some(p) => p != class,
            };
            if boundary {
                tokens.push(&text[start..i]);
                start = i;
            }
            prev = Some(class);
        }
        if start < text.len() {
            tokens.push(&text[start..]);
        }
        tokens
    }
}

/// Validated chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl ChunkParams {
    /// Validate and build chunking parameters.
    ///
    /// `separators` are tried in order; an empty list disables preferred
    /// breaks and every cut is a hard cut.
    pub fn new(
        chunk_size: usize,
        overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        if separators.iter().any(|s| s.is_empty()) {
            return Err(ChunkError::EmptySeparator);
        }
        Ok(Self {
            chunk_size,
            overlap,
            separators,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }
}

/// Split every document, in order. Chunks never span two documents.
pub fn split_documents(
    documents: &[Document],
    params: &ChunkParams,
    tokenizer: &dyn Tokenizer,
) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| split_text(&doc.id, &doc.text, params, tokenizer))
        .collect()
}

/// Split one document's text into overlapping token windows.
///
/// # Guarantees
///
/// - Every chunk holds at most `chunk_size` tokens.
/// - Consecutive chunks share exactly `overlap` tokens.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Empty text yields no chunks.
/// - The output depends only on the inputs.
pub fn split_text(
    document_id: &str,
    text: &str,
    params: &ChunkParams,
    tokenizer: &dyn Tokenizer,
) -> Vec<Chunk> {
    let tokens = tokenizer.tokenize(text);
    let total = tokens.len();
    let mut chunks = Vec::new();
    if total == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let hard_end = (start + params.chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            // The cut must land past the overlap so the next window advances.
            let earliest = (start + params.overlap + 1).max(start + params.chunk_size / 2);
            preferred_break(&tokens, earliest, hard_end, &params.separators).unwrap_or(hard_end)
        };

        chunks.push(make_chunk(
            document_id,
            chunks.len(),
            &tokens[start..end],
            start,
        ));

        if end == total {
            break;
        }
        start = end - params.overlap;
    }

    chunks
}

/// Find the latest cut in `[earliest, latest]` that directly follows a
/// separator, honoring separator priority.
fn preferred_break(
    tokens: &[&str],
    earliest: usize,
    latest: usize,
    separators: &[String],
) -> Option<usize> {
    if earliest > latest {
        return None;
    }
    separators.iter().find_map(|sep| {
        (earliest..=latest)
            .rev()
            .find(|&cut| ends_with(&tokens[..cut], sep))
    })
}

/// Whether the concatenation of `tokens` ends with `suffix`.
fn ends_with(tokens: &[&str], suffix: &str) -> bool {
    let mut tail = String::new();
    for tok in tokens.iter().rev() {
        tail.insert_str(0, tok);
        if tail.len() >= suffix.len() {
            break;
        }
    }
    tail.ends_with(suffix)
}

fn make_chunk(document_id: &str, index: usize, tokens: &[&str], token_start: usize) -> Chunk {
    let text = tokens.concat();
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", document_id, index).as_bytes(),
    );

    Chunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text,
        token_start,
        token_count: tokens.len(),
        hash,
    }
}
