
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use super::{Document, RagEngine, SearchHit};
use crate::{RagError, Result};

/// Cloneable handle for sharing one engine between threads.
///
/// `add` and `clear` take the write lock, searches take the read lock, so a search never sees
/// the vector index and the metadata sidecar at different row counts.
#[derive(Debug, Clone)]
pub struct SharedRagEngine {
    inner: Arc<RwLock<RagEngine>>,
}

impl SharedRagEngine {
    #[inline]
    pub fn new(engine: RagEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    #[inline]
    pub fn add(&self, documents: &[Document]) -> Result<usize> {
        self.write()?.add(documents)
    }

    #[inline]
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear()
    }

    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Result<String> {
        self.read()?.search(query, k)
    }

    #[inline]
    pub fn search_hits(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.read()?.search_hits(query, k)
    }

    /// Retrieval context for the chat layer; empty on any failure
    #[inline]
    pub fn context_for(&self, query: &str, k: usize) -> String {
        match self.read() {
            Ok(engine) => engine.context_for(query, k),
            Err(e) => {
                warn!("Retrieval unavailable, continuing without context: {}", e);
                String::new()
            }
        }
    }

    #[inline]
    pub fn size(&self) -> Result<usize> {
        Ok(self.read()?.size())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RagEngine>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RagEngine>> {
        self.inner.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> RagError {
    RagError::StorageIntegrity(
        "Engine lock poisoned by a writer that panicked mid-update".to_string(),
    )
}
