//! Cache Key Module
//!
//! Maps a request URL and optional byte range to the on-disk entry name.

use std::fmt;

use md5::{Digest, Md5};

/// Length of a hex encoded MD5 digest.
const KEY_LENGTH: usize = 32;

// == Cache Key ==
/// Lowercase hex MD5 of the URL, followed by the range specifier when one is
/// present. Doubles as the entry's file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `url`, folding in a non-empty `range`.
    pub fn derive(url: &str, range: Option<&str>) -> Self {
        let mut hasher = Md5::new();
        hasher.update(url.as_bytes());
        if let Some(range) = range.filter(|r| !r.is_empty()) {
            hasher.update(range.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `name` looks like a file written by the store.
    pub fn is_valid_file_name(name: &str) -> bool {
        name.len() == KEY_LENGTH
            && name
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase hex MD5 of `data`, as stored in the `MD5` metadata field.
pub fn content_digest(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}
