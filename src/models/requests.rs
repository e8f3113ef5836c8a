//! Request DTOs for the gateway API
//!
//! Defines the query strings accepted by the gateway endpoints.

use serde::Deserialize;

/// Query for the endpoints addressing one cached resource
/// (`GET /fetch`, `GET /entries`, `DELETE /entries`)
#[derive(Debug, Clone, Deserialize)]
pub struct EntryQuery {
    /// Absolute URL of the resource
    pub url: String,
    /// Optional `Range` header value, e.g. `bytes=0-99`
    #[serde(default)]
    pub range: Option<String>,
}

impl EntryQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.is_empty() {
            return Some("url cannot be empty".to_string());
        }
        match reqwest::Url::parse(&self.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => return Some(format!("unsupported scheme '{}'", parsed.scheme())),
            Err(e) => return Some(format!("invalid url '{}': {}", self.url, e)),
        }
        None
    }

    /// Range with empty values treated as absent.
    pub fn range(&self) -> Option<&str> {
        self.range.as_deref().filter(|r| !r.is_empty())
    }
}
