
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::config::ConfigError;

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// A contiguous window of a document's content, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Id of the document this chunk was cut from
    pub parent_doc_id: String,
    /// Position of this chunk within its document, starting at 0
    pub sequence_index: usize,
    /// The chunk text
    pub text: String,
}

impl Chunk {
    /// Stable id used in the metadata sidecar, e.g. `"42_0"`
    #[inline]
    pub fn chunk_id(&self) -> String {
        format!("{}_{}", self.parent_doc_id, self.sequence_index)
    }
}

/// Configuration for positional chunking. Sizes are counted in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Width of each window
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_window(self.chunk_size, self.chunk_overlap)
    }

    /// Distance between the starts of two consecutive windows
    #[inline]
    pub const fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap)
    }
}

fn validate_window(chunk_size: usize, overlap: usize) -> std::result::Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size));
    }
    if overlap >= chunk_size {
        return Err(ConfigError::OverlapTooLarge(overlap, chunk_size));
    }
    Ok(())
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// Windows start at offset 0 and advance by `chunk_size - overlap` until a window reaches the
/// end of the text; the last window may be shorter. Empty input yields no windows.
#[inline]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(chunk_size, overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let stride = chunk_size - overlap;
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    Ok(windows)
}

/// Chunk a document's content using `config`
#[inline]
pub fn chunk_document(doc_id: &str, content: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chunks: Vec<Chunk> = split_text(content, config.chunk_size, config.chunk_overlap)?
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            parent_doc_id: doc_id.to_string(),
            sequence_index,
            text,
        })
        .collect();

    debug!(
        "Chunked document '{}' ({} chars) into {} chunks",
        doc_id,
        content.chars().count(),
        chunks.len()
    );

    Ok(chunks)
}
