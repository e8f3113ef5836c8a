//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing JSON bodies.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde::Serialize;

use crate::cache::{CacheEntry, CacheKey, CacheStats, SweepReport};

/// Metadata of one stored entry (GET /entries)
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    /// File name of the entry in the cache directory
    pub key: String,
    pub url: String,
    /// Stored range, omitted when the entry holds the full resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Status replayed when serving the entry
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub md5: Option<String>,
    /// Last successful origin contact in RFC 3339, if recorded
    pub updated_at: Option<String>,
    pub body_len: usize,
    pub headers: BTreeMap<String, String>,
}

impl EntryResponse {
    /// Builds the response from a stored entry
    pub fn new(key: &CacheKey, entry: &CacheEntry) -> Self {
        Self {
            key: key.to_string(),
            url: entry.url.clone(),
            range: Some(entry.range.clone()).filter(|r| !r.is_empty()),
            status: entry.status_code().as_u16(),
            etag: entry.etag.clone(),
            last_modified: entry.last_modified.clone(),
            md5: entry.content_md5.clone(),
            updated_at: entry.updated_at.and_then(format_timestamp),
            body_len: entry.body.len(),
            headers: entry.headers.clone(),
        }
    }
}

fn format_timestamp(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.to_rfc3339())
}

/// Response body for DELETE /entries
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The URL whose entry was deleted
    pub url: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            message: format!("Entry for '{}' deleted successfully", url),
            url,
        }
    }
}

/// Response body for POST /sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    /// Age limit the sweep ran with
    pub max_age_hours: u64,
    #[serde(flatten)]
    pub report: SweepReport,
}

impl SweepResponse {
    pub fn new(max_age_hours: u64, report: SweepReport) -> Self {
        Self {
            max_age_hours,
            report,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Requests served from disk without contacting the origin
    pub hits: u64,
    /// Requests served from disk after a 304
    pub revalidated: u64,
    /// Fresh bodies fetched and stored
    pub misses: u64,
    /// Fresh bodies identical to the stored version
    pub unchanged: u64,
    /// Requests that bypassed the cache
    pub bypassed: u64,
    /// Key collisions detected
    pub collisions: u64,
    /// Entries removed by sweeps
    pub evictions: u64,
    /// Current number of entries on disk
    pub total_entries: usize,
    /// (hits + revalidated) / (hits + revalidated + misses)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            revalidated: stats.revalidated,
            misses: stats.misses,
            unchanged: stats.unchanged,
            bypassed: stats.bypassed,
            collisions: stats.collisions,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
