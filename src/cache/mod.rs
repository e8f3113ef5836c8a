//! Cache Module
//!
//! Persistent disk cache for HTTP GET responses with conditional
//! revalidation and age-based eviction.

mod entry;
mod eviction;
mod key;
mod protocol;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp, CacheEntry};
pub use eviction::{sweep_directory, SweepReport};
pub use key::{content_digest, CacheKey};
pub use protocol::{CachingTransport, ContentApproval};
pub use stats::CacheStats;
pub use store::DiskStore;

// == Public Constants ==
/// Response headers stored with an entry and replayed when serving it.
/// `Last-Modified` is replayed too but lives in the validator field.
pub const PRESERVED_HEADERS: [&str; 4] = [
    "Content-Type",
    "Content-Encoding",
    "Content-Length",
    "Content-Range",
];

/// Set to `1` on responses served from the local store
pub const X_CACHED: &str = "x-cached";

/// Set to `1` when the body equals the previously stored version
pub const X_CONTENT_UNCHANGED: &str = "x-content-unchanged";
