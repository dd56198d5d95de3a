// Retrieval engine
// Owns the vector index and its metadata sidecar and is the only code that mutates them

pub mod shared;


pub use shared::SharedRagEngine;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::slice;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::persistence::{self, StoragePaths};
use crate::database::{MetadataRecord, MetadataStore, VectorIndex};
use crate::embeddings::{
    ChunkingConfig, EmbeddingProvider, check_batch, chunk_document, provider_from_config,
};
use crate::{RagError, Result};

/// Returned by [`RagEngine::search`] when nothing matches
pub const NO_RESULTS: &str = "No relevant results found.";

/// A source document supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub link: String,
    pub content: String,
}

impl Document {
    #[inline]
    pub fn new(
        doc_id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            title: title.into(),
            link: link.into(),
            content: content.into(),
        }
    }
}

/// Search result from nearest-neighbour search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub row: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
    /// Score in `[0, 100]`, higher is closer
    pub relevance: f32,
    pub record: MetadataRecord,
}

/// Exact-search retrieval engine over a persisted, row-aligned pair of stores.
///
/// Every `add` and `clear` is committed to disk before it returns; searches only read the
/// in-memory copy.
pub struct RagEngine {
    paths: StoragePaths,
    chunking: ChunkingConfig,
    embedder: Box<dyn EmbeddingProvider>,
    index: VectorIndex,
    metadata: MetadataStore,
}

impl std::fmt::Debug for RagEngine {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("paths", &self.paths)
            .field("chunking", &self.chunking)
            .field("embedder", &self.embedder.name())
            .field("rows", &self.index.size())
            .finish()
    }
}

impl RagEngine {
    /// Open the engine persisted at `base`, or start an empty one if nothing is there yet
    #[inline]
    pub fn open<P: AsRef<Path>>(
        base: P,
        chunking: ChunkingConfig,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        chunking.validate()?;
        let paths = StoragePaths::new(base);

        let (index, metadata) = match persistence::load(&paths)? {
            Some((index, metadata)) => {
                if index.dimension() != embedder.dimension() {
                    return Err(RagError::Configuration(format!(
                        "Index at {} holds {}-dimensional vectors but {} produces {} dimensions",
                        paths.vectors.display(),
                        index.dimension(),
                        embedder.name(),
                        embedder.dimension()
                    )));
                }
                (index, metadata)
            }
            None => {
                debug!("No index at {}, starting empty", paths.vectors.display());
                (VectorIndex::new(embedder.dimension())?, MetadataStore::new())
            }
        };

        info!(
            "Opened index at {} with {} rows using {}",
            paths.vectors.display(),
            index.size(),
            embedder.name()
        );

        Ok(Self {
            paths,
            chunking,
            embedder,
            index,
            metadata,
        })
    }

    /// Open the engine described by `config`
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let embedder = provider_from_config(config)?;
        Self::open(config.index_path(), config.chunking, embedder)
    }

    /// Chunk, embed, append and persist `documents`, returning the number of rows added.
    ///
    /// `documents` is a mapping from `doc_id` to document, kept as a slice so the caller's order
    /// decides row order: each document's chunks land contiguously, in chunk order, after those
    /// of the documents before it. A `doc_id` repeated within one call is rejected with
    /// [`RagError::DuplicateDocument`] before anything is embedded or written. Ids are not
    /// checked against earlier calls.
    ///
    /// Either all chunks of all documents are committed or none are: on any failure the
    /// in-memory stores are rolled back to their previous length.
    #[inline]
    pub fn add(&mut self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            debug!("Nothing to add");
            return Ok(0);
        }

        let mut seen = HashSet::with_capacity(documents.len());
        if let Some(duplicate) = documents.iter().find(|doc| !seen.insert(doc.doc_id.as_str())) {
            return Err(RagError::DuplicateDocument(duplicate.doc_id.clone()));
        }

        let mut chunk_ids = Vec::new();
        let mut texts = Vec::new();
        let mut sources = Vec::new();
        for document in documents {
            for chunk in chunk_document(&document.doc_id, &document.content, &self.chunking)? {
                chunk_ids.push(chunk.chunk_id());
                texts.push(chunk.text);
                sources.push(document);
            }
        }

        if texts.is_empty() {
            debug!("{} documents produced no chunks", documents.len());
            return Ok(0);
        }

        debug!(
            "Embedding {} chunks from {} documents with {}",
            texts.len(),
            documents.len(),
            self.embedder.name()
        );
        let vectors = self.embedder.embed_batch(&texts)?;
        check_batch(self.embedder.as_ref(), texts.len(), &vectors)?;

        let records: Vec<MetadataRecord> = chunk_ids
            .into_iter()
            .zip(texts)
            .zip(sources)
            .map(|((chunk_id, content), document)| MetadataRecord {
                chunk_id,
                title: document.title.clone(),
                link: document.link.clone(),
                content,
            })
            .collect();
        let added = records.len();
        let prior = self.size();

        self.index.add(&vectors)?;
        self.metadata.append(records);

        if let Err(e) = persistence::commit(&self.paths, &self.index, &self.metadata) {
            error!("Failed to persist {} new rows, rolling back: {}", added, e);
            self.index.truncate(prior);
            self.metadata.truncate(prior);
            return Err(e);
        }

        info!(
            "Added {} chunks from {} documents ({} rows total)",
            added,
            documents.len(),
            self.size()
        );
        Ok(added)
    }

    /// The `k` closest chunks to `query`, nearest first
    #[inline]
    pub fn search_hits(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query)?;
        check_batch(self.embedder.as_ref(), 1, slice::from_ref(&embedding))?;

        let neighbors = self.index.search(&embedding, k)?;
        debug!("Query matched {} of {} rows", neighbors.len(), self.size());

        neighbors
            .into_iter()
            .map(|neighbor| {
                Ok(SearchHit {
                    row: neighbor.row,
                    distance: neighbor.distance,
                    relevance: relevance_from_distance(neighbor.distance),
                    record: self.metadata.get(neighbor.row)?.clone(),
                })
            })
            .collect()
    }

    /// Ranked, human-readable context for `query`, or [`NO_RESULTS`]
    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Result<String> {
        Ok(format_hits(&self.search_hits(query, k)?))
    }

    /// Like [`RagEngine::search`], but any failure is logged and turned into empty context
    #[inline]
    pub fn context_for(&self, query: &str, k: usize) -> String {
        self.search(query, k).unwrap_or_else(|e| {
            warn!("Retrieval failed, continuing without context: {}", e);
            String::new()
        })
    }

    /// Remove every row and persist the empty pair
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        let index = VectorIndex::new(self.index.dimension())?;
        let metadata = MetadataStore::new();
        persistence::commit(&self.paths, &index, &metadata)?;

        let removed = self.size();
        self.index = index;
        self.metadata = metadata;
        info!("Cleared {} rows from {}", removed, self.paths.vectors.display());
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.index.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Metadata for a row
    #[inline]
    pub fn record(&self, row: usize) -> Result<&MetadataRecord> {
        self.metadata.get(row)
    }

    #[inline]
    pub const fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    #[inline]
    pub fn provider_name(&self) -> &str {
        self.embedder.name()
    }
}

/// Map a squared distance onto `[0, 100]`: 100 for an exact match, falling towards 0 as the
/// distance grows
#[inline]
pub fn relevance_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (100.0 / (1.0 + distance.max(0.0))).clamp(0.0, 100.0)
}

/// Render hits in rank order, or [`NO_RESULTS`] when there are none
#[inline]
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }

    hits.iter()
        .map(|hit| {
            format!(
                "[Source: {}] (Relevance: {:.1}%)\nURL: {}\n{}\n",
                hit.record.title, hit.relevance, hit.record.link, hit.record.content
            )
        })
        .join("\n\n")
}
