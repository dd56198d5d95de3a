// On-disk layout of the vector index and its metadata sidecar
//
// <base>                          bincode-encoded vector index
// <base>_metadata.json            JSON array of metadata records
// <base>_metadata.json.pending    metadata written by a commit that has not finished yet
//
// A commit stages both files as temporary files, publishes the metadata as `.pending`, then
// renames the vector file into place (the commit point) and finally moves the pending metadata
// over the old one. Recovery decides which side of the commit point a crash happened on by
// comparing the pending record count with the row count of the vector file.


use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::metadata::MetadataStore;
use super::vector_index::VectorIndex;
use crate::{RagError, Result};

const METADATA_SUFFIX: &str = "_metadata.json";
const PENDING_SUFFIX: &str = ".pending";

/// Paths of the persisted pair sharing one base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
    pub pending_metadata: PathBuf,
}

impl StoragePaths {
    #[inline]
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        let metadata = with_suffix(base, METADATA_SUFFIX);
        let pending_metadata = with_suffix(&metadata, PENDING_SUFFIX);
        Self {
            vectors: base.to_path_buf(),
            metadata,
            pending_metadata,
        }
    }

    /// Directory holding the pair
    #[inline]
    pub fn directory(&self) -> &Path {
        match self.vectors.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// What [`recover`] found and did about an interrupted commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No commit was in progress
    Clean,
    /// The crash happened after the vector file was replaced; the commit was completed
    RolledForward,
    /// The crash happened before the vector file was replaced; the staged metadata was dropped
    Discarded,
}

/// Read-only description of the persisted pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReport {
    pub vectors_present: bool,
    pub metadata_present: bool,
    pub pending_commit: bool,
    pub dimension: Option<usize>,
    pub vector_rows: Option<usize>,
    pub metadata_records: Option<usize>,
}

impl StorageReport {
    /// Whether a load would succeed (ignoring an interrupted commit, which load repairs)
    #[inline]
    pub fn is_consistent(&self) -> bool {
        match (self.vectors_present, self.metadata_present) {
            (false, false) => true,
            (true, true) => self.vector_rows == self.metadata_records,
            _ => false,
        }
    }

    #[inline]
    pub fn summary(&self) -> String {
        if !self.vectors_present && !self.metadata_present {
            return "No persisted index".to_string();
        }

        let rows = |count: Option<usize>| {
            count.map_or_else(|| "missing".to_string(), |n| n.to_string())
        };
        let mut summary = format!(
            "{} vector rows, {} metadata records",
            rows(self.vector_rows),
            rows(self.metadata_records)
        );
        if self.pending_commit {
            summary.push_str(", interrupted commit pending recovery");
        }
        if self.is_consistent() {
            summary.push_str(" - consistent");
        } else {
            summary.push_str(" - INCONSISTENT");
        }
        summary
    }
}

/// Durably write both stores so that a later [`load`] sees either the previous pair or this one.
///
/// A commit left unfinished by an earlier call is completed or dropped first, so at most one
/// `.pending` file ever exists. Temporary files are removed if anything fails before the commit
/// point.
#[inline]
pub fn commit(paths: &StoragePaths, index: &VectorIndex, metadata: &MetadataStore) -> Result<()> {
    recover(paths)?;

    if index.size() != metadata.size() {
        return Err(RagError::StorageIntegrity(format!(
            "Refusing to persist {} vector rows with {} metadata records",
            index.size(),
            metadata.size()
        )));
    }

    let dir = paths.directory();
    fs::create_dir_all(dir).map_err(persistence_error("create directory", dir))?;

    let staged_vectors = write_temp(dir, |writer| index.write_to(writer))?;
    let staged_metadata = write_temp(dir, |writer| metadata.write_to(writer))?;
    debug!("Staged {} rows in {}", index.size(), dir.display());

    staged_metadata
        .persist(&paths.pending_metadata)
        .map_err(|e| persistence_error("stage metadata", &paths.pending_metadata)(e.error))?;

    if let Err(e) = staged_vectors.persist(&paths.vectors) {
        let _ = fs::remove_file(&paths.pending_metadata);
        return Err(persistence_error("replace vector index", &paths.vectors)(e.error));
    }
    sync_directory(dir);

    // Past the commit point: a failure here is repaired by the next recover()
    if let Err(e) = fs::rename(&paths.pending_metadata, &paths.metadata) {
        warn!(
            "Committed vector index but could not move {} into place ({}); it will be completed on next load",
            paths.pending_metadata.display(),
            e
        );
        return Ok(());
    }
    sync_directory(dir);

    info!(
        "Persisted {} rows to {}",
        index.size(),
        paths.vectors.display()
    );
    Ok(())
}

/// Finish or roll back a commit that was interrupted by a crash
#[inline]
pub fn recover(paths: &StoragePaths) -> Result<Recovery> {
    if !paths.pending_metadata.exists() {
        return Ok(Recovery::Clean);
    }

    let pending_records = read_metadata(&paths.pending_metadata).map(|store| store.size());
    let vector_rows = if paths.vectors.exists() {
        Some(read_vector_header(&paths.vectors)?.1)
    } else {
        None
    };

    match (pending_records, vector_rows) {
        (Ok(records), Some(rows)) if records == rows => {
            fs::rename(&paths.pending_metadata, &paths.metadata)
                .map_err(persistence_error("complete interrupted commit", &paths.metadata))?;
            sync_directory(paths.directory());
            warn!(
                "Completed interrupted commit of {} rows at {}",
                rows,
                paths.vectors.display()
            );
            Ok(Recovery::RolledForward)
        }
        _ => {
            fs::remove_file(&paths.pending_metadata).map_err(persistence_error(
                "discard interrupted commit",
                &paths.pending_metadata,
            ))?;
            warn!(
                "Discarded interrupted commit at {}",
                paths.pending_metadata.display()
            );
            Ok(Recovery::Discarded)
        }
    }
}

/// Load the persisted pair, repairing an interrupted commit first.
///
/// Returns `None` when nothing has been persisted yet. One file without the other, or files
/// whose row counts disagree, are storage integrity errors.
#[inline]
pub fn load(paths: &StoragePaths) -> Result<Option<(VectorIndex, MetadataStore)>> {
    recover(paths)?;

    match (paths.vectors.exists(), paths.metadata.exists()) {
        (false, false) => Ok(None),
        (true, false) => {
            error!("Metadata file {} is missing", paths.metadata.display());
            Err(RagError::StorageIntegrity(format!(
                "Vector index {} exists but metadata file {} is missing",
                paths.vectors.display(),
                paths.metadata.display()
            )))
        }
        (false, true) => {
            error!("Vector index file {} is missing", paths.vectors.display());
            Err(RagError::StorageIntegrity(format!(
                "Metadata file {} exists but vector index {} is missing",
                paths.metadata.display(),
                paths.vectors.display()
            )))
        }
        (true, true) => {
            let file = File::open(&paths.vectors)
                .map_err(persistence_error("open vector index", &paths.vectors))?;
            let index = VectorIndex::read_from(BufReader::new(file))?;
            let metadata = read_metadata(&paths.metadata)?;

            if index.size() != metadata.size() {
                error!(
                    "Persisted pair at {} is out of sync: {} vector rows vs {} metadata records",
                    paths.vectors.display(),
                    index.size(),
                    metadata.size()
                );
                return Err(RagError::StorageIntegrity(format!(
                    "{} has {} rows but {} has {} records",
                    paths.vectors.display(),
                    index.size(),
                    paths.metadata.display(),
                    metadata.size()
                )));
            }

            info!(
                "Loaded {} rows ({} dimensions) from {}",
                index.size(),
                index.dimension(),
                paths.vectors.display()
            );
            Ok(Some((index, metadata)))
        }
    }
}

/// Describe the persisted pair without modifying anything
#[inline]
pub fn inspect(paths: &StoragePaths) -> Result<StorageReport> {
    let vectors_present = paths.vectors.exists();
    let metadata_present = paths.metadata.exists();

    let (dimension, vector_rows) = if vectors_present {
        let (dimension, rows) = read_vector_header(&paths.vectors)?;
        (Some(dimension), Some(rows))
    } else {
        (None, None)
    };
    let metadata_records = if metadata_present {
        Some(read_metadata(&paths.metadata)?.size())
    } else {
        None
    };

    Ok(StorageReport {
        vectors_present,
        metadata_present,
        pending_commit: paths.pending_metadata.exists(),
        dimension,
        vector_rows,
        metadata_records,
    })
}

fn write_temp<F>(dir: &Path, write: F) -> Result<NamedTempFile>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let mut staged =
        NamedTempFile::new_in(dir).map_err(persistence_error("create temporary file", dir))?;
    let path = staged.path().to_path_buf();
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(persistence_error("write temporary file", &path))?;
    }
    staged
        .as_file()
        .sync_all()
        .map_err(persistence_error("sync temporary file", &path))?;
    Ok(staged)
}

fn read_metadata(path: &Path) -> Result<MetadataStore> {
    let file = File::open(path).map_err(persistence_error("open metadata file", path))?;
    MetadataStore::read_from(BufReader::new(file))
}

fn read_vector_header(path: &Path) -> Result<(usize, usize)> {
    let file = File::open(path).map_err(persistence_error("open vector index", path))?;
    VectorIndex::read_header(BufReader::new(file))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn persistence_error<'a>(
    action: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> RagError + 'a {
    move |e| RagError::Persistence(format!("Failed to {} {}: {}", action, path.display(), e))
}

#[cfg(unix)]
fn sync_directory(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) {}
