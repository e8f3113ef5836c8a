//! Eviction Sweep
//!
//! Deletes entries whose last access (file mtime) is older than the configured
//! age. Files that don't look like entries are reported and left alone.

use std::fs;
use std::path::Path;
use std::time::{Instant, SystemTime};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::CacheKey;
use crate::error::{CacheError, Result};

const SECS_PER_HOUR: u64 = 3600;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries deleted for being older than the limit
    pub removed: usize,
    /// Entries still within the limit
    pub kept: usize,
    /// Files with names that aren't cache keys
    pub unrecognized: usize,
    /// Stale entries that could not be deleted
    pub failures: usize,
    /// Duration of the sweep in milliseconds
    pub duration_ms: u64,
}

/// Sweeps the files directly inside `dir`.
///
/// Age is measured in whole hours (truncated); an entry is removed when its
/// age is strictly greater than `max_age_hours`.
pub fn sweep_directory(dir: &Path, max_age_hours: u64) -> Result<SweepReport> {
    let start = Instant::now();
    let now = SystemTime::now();
    let mut report = SweepReport::default();

    let entries = fs::read_dir(dir).map_err(|source| CacheError::BasePath {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            // Removed by a concurrent sweep or writer
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str().filter(|n| CacheKey::is_valid_file_name(n)) else {
            warn!("Unrecognized file in cache directory: {}", path.display());
            report.unrecognized += 1;
            continue;
        };

        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let age_hours = now
            .duration_since(mtime)
            .map(|age| age.as_secs() / SECS_PER_HOUR)
            .unwrap_or(0);

        if age_hours <= max_age_hours {
            report.kept += 1;
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Evicted {} ({} hours since last use)", name, age_hours);
                report.removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to evict {}: {}", path.display(), e);
                report.failures += 1;
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;

    if report.removed > 0 {
        info!(
            "Cache sweep: removed {} stale entries, kept {}",
            report.removed, report.kept
        );
    } else {
        debug!("Cache sweep: no stale entries among {}", report.kept);
    }

    Ok(report)
}
