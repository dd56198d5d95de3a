
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::error;

use crate::{RagError, Result};

/// Per-chunk attributes stored at the same ordinal position as the chunk's vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRecord {
    /// `"{doc_id}_{sequence_index}"`
    pub chunk_id: String,
    /// Title of the source document
    pub title: String,
    /// Link to the source document
    pub link: String,
    /// The chunk text
    pub content: String,
}

/// Row-aligned metadata sidecar, persisted as a pretty-printed JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// Append records in the same order as the matching vectors
    #[inline]
    pub fn append(&mut self, records: Vec<MetadataRecord>) {
        self.records.extend(records);
    }

    /// Resolve an index row to its record.
    ///
    /// A row outside the store means the sidecar and the vector index have diverged, which is
    /// reported as a storage integrity error.
    #[inline]
    pub fn get(&self, row: usize) -> Result<&MetadataRecord> {
        self.records.get(row).ok_or_else(|| {
            error!(
                "Row {} requested but metadata store holds only {} records",
                row,
                self.records.len()
            );
            RagError::StorageIntegrity(format!(
                "Row {} has no metadata record (store holds {} records)",
                row,
                self.records.len()
            ))
        })
    }

    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Keep only the first `rows` records
    #[inline]
    pub fn truncate(&mut self, rows: usize) {
        self.records.truncate(rows);
    }

    #[inline]
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.records)
            .map_err(|e| RagError::Persistence(format!("Failed to encode metadata: {}", e)))
    }

    #[inline]
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let records = serde_json::from_reader(reader)
            .map_err(|e| RagError::Persistence(format!("Failed to decode metadata: {}", e)))?;
        Ok(Self { records })
    }
}
