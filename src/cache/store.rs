//! Cache Store Module
//!
//! Owns the cache directory: one file per key, replaced atomically through a
//! sibling temp file and rename so readers never observe a partial entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use filetime::FileTime;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::{CacheError, Result};

// == Disk Store ==
/// Directory of entry files named by [`CacheKey`].
#[derive(Debug, Clone)]
pub struct DiskStore {
    base_path: PathBuf,
}

impl DiskStore {
    // == Constructor ==
    /// Opens the store, creating `base_path` if needed.
    ///
    /// Fails when the directory can't be created or isn't a directory.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).map_err(|source| CacheError::BasePath {
            path: base_path.clone(),
            source,
        })?;

        if !base_path.is_dir() {
            return Err(CacheError::BasePath {
                path: base_path,
                source: io::Error::other("not a directory"),
            });
        }

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    // == Read ==
    /// Loads the entry for `key`.
    ///
    /// Missing, empty, unreadable and corrupt files all read as `None`; the
    /// caller treats them as a miss.
    pub fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.path_for(key);

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if data.is_empty() {
            return None;
        }

        match CacheEntry::decode(Bytes::from(data)) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    // == Write ==
    /// Replaces the entry for `key` in full.
    ///
    /// The existing file stays untouched until the final rename succeeds.
    pub fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(key);
        let write_error = |source: io::Error| CacheError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.base_path).map_err(write_error)?;
        tmp.write_all(&entry.encode()).map_err(write_error)?;
        tmp.flush().map_err(write_error)?;
        tmp.persist(&path).map_err(|e| write_error(e.error))?;

        debug!("Stored cache entry {} for {}", key, entry.url);
        Ok(())
    }

    // == Touch ==
    /// Marks the entry as used now; the sweep ages entries by mtime.
    pub fn touch(&self, key: &CacheKey) {
        let path = self.path_for(key);
        if let Err(e) = filetime::set_file_mtime(&path, FileTime::now()) {
            debug!("Cannot touch cache entry {}: {}", path.display(), e);
        }
    }

    // == Remove ==
    /// Deletes the entry for `key`. Returns false if there was none.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Internal(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    // == Length ==
    /// Counts entry files currently on disk.
    pub fn len(&self) -> usize {
        fs::read_dir(&self.base_path)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                    .filter(|e| {
                        e.file_name()
                            .to_str()
                            .map(CacheKey::is_valid_file_name)
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
