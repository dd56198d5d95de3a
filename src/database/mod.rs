// Database module
// Flat vector index plus the row-aligned metadata sidecar, and the protocol that persists them as a pair

pub mod metadata;
pub mod persistence;
pub mod vector_index;

pub use metadata::{MetadataRecord, MetadataStore};
pub use persistence::{Recovery, StoragePaths, StorageReport};
pub use vector_index::{Neighbor, VectorIndex};
