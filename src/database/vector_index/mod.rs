#[cfg(test)]
mod tests;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{Read, Write};
use tracing::debug;

use crate::embeddings::Embedding;
use crate::{RagError, Result};

const FORMAT_VERSION: u32 = 1;

/// Exact nearest-neighbour index over a flat, row-major `f32` buffer.
///
/// Rows are append-only and numbered in insertion order; a row's number is the join key into
/// the metadata sidecar. Search compares the query against every stored row (squared
/// Euclidean distance), so each query costs O(rows × dimension).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// One nearest-neighbour match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

/// On-disk representation
#[derive(Deserialize)]
struct PersistedIndex {
    version: u32,
    dimension: u64,
    rows: u64,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    version: u32,
    dimension: u64,
    rows: u64,
    data: &'a [f32],
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Configuration(
                "Vector index dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored rows
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the vector stored at `row`
    #[inline]
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Append vectors in order. Either every vector is appended or none is.
    #[inline]
    pub fn add(&mut self, vectors: &[Embedding]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        debug!(
            "Appended {} vectors, index now holds {} rows",
            vectors.len(),
            self.size()
        );
        Ok(())
    }

    /// Return the `k` rows closest to `query`, nearest first.
    ///
    /// The result has `min(k, size())` entries. Equal distances are ordered by row.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let neighbors = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row,
                distance: squared_l2(query, vector),
            })
            .filter(|neighbor| !neighbor.distance.is_nan())
            .k_smallest_by(k, compare_neighbors)
            .collect();

        Ok(neighbors)
    }

    /// Drop every row, keeping the dimension
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Keep only the first `rows` rows
    #[inline]
    pub fn truncate(&mut self, rows: usize) {
        self.data.truncate(rows.saturating_mul(self.dimension));
    }

    /// Serialize the full index
    #[inline]
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let persisted = PersistedIndexRef {
            version: FORMAT_VERSION,
            dimension: self.dimension as u64,
            rows: self.size() as u64,
            data: &self.data,
        };
        bincode::serialize_into(writer, &persisted)
            .map_err(|e| RagError::Persistence(format!("Failed to encode vector index: {}", e)))
    }

    /// Reconstruct an index written by [`VectorIndex::write_to`]
    #[inline]
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let persisted: PersistedIndex = bincode::deserialize_from(reader)
            .map_err(|e| RagError::Persistence(format!("Failed to decode vector index: {}", e)))?;

        if persisted.version != FORMAT_VERSION {
            return Err(RagError::Persistence(format!(
                "Unsupported vector index format version {}",
                persisted.version
            )));
        }

        let dimension = usize::try_from(persisted.dimension).map_err(|_| {
            RagError::StorageIntegrity(format!(
                "Vector index dimension {} does not fit in memory",
                persisted.dimension
            ))
        })?;
        if dimension == 0 {
            return Err(RagError::StorageIntegrity(
                "Vector index file declares a zero dimension".to_string(),
            ));
        }

        let expected_len = (persisted.rows as usize).checked_mul(dimension);
        if expected_len != Some(persisted.data.len()) {
            return Err(RagError::StorageIntegrity(format!(
                "Vector index file declares {} rows of {} dimensions but holds {} values",
                persisted.rows,
                dimension,
                persisted.data.len()
            )));
        }

        Ok(Self {
            dimension,
            data: persisted.data,
        })
    }

    /// Read only the header of a persisted index: `(dimension, rows)`
    #[inline]
    pub fn read_header<R: Read>(mut reader: R) -> Result<(usize, usize)> {
        let mut header = [0_u8; 20];
        reader.read_exact(&mut header).map_err(|e| {
            RagError::Persistence(format!("Failed to read vector index header: {}", e))
        })?;
        let (version, dimension, rows): (u32, u64, u64) =
            bincode::deserialize(&header).map_err(|e| {
                RagError::Persistence(format!("Failed to decode vector index header: {}", e))
            })?;

        if version != FORMAT_VERSION {
            return Err(RagError::Persistence(format!(
                "Unsupported vector index format version {}",
                version
            )));
        }
        Ok((dimension as usize, rows as usize))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row.cmp(&b.row))
}
