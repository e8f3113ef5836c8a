//! Cache Entry Module
//!
//! Defines the persisted entry and its on-disk encoding: `Key value` metadata
//! lines sorted by key, a blank line, then the raw body until end of file.

use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::header::{ETAG, LAST_MODIFIED};
use reqwest::StatusCode;

use crate::cache::key::content_digest;
use crate::cache::PRESERVED_HEADERS;
use crate::error::{CacheError, Result};
use crate::transport::HttpResponse;

// == Metadata Keys ==
const FIELD_URL: &str = "Url";
const FIELD_RANGE: &str = "Range";
const FIELD_CODE: &str = "Code";
const FIELD_ETAG: &str = "ETag";
const FIELD_LAST_MODIFIED: &str = "Last-Modified";
const FIELD_MD5: &str = "MD5";
const FIELD_NO_UPDATE: &str = "No-Update";

// == Cache Entry ==
/// One cached response together with the metadata needed to revalidate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Request URL, used to detect key collisions
    pub url: String,
    /// Request `Range` header, empty when none
    pub range: String,
    /// Stored status; legacy entries without one are served as 200
    pub status: Option<u16>,
    /// `ETag` validator
    pub etag: Option<String>,
    /// `Last-Modified` validator, also replayed as a header
    pub last_modified: Option<String>,
    /// Hex MD5 of the body
    pub content_md5: Option<String>,
    /// Preserved response headers keyed by canonical name
    pub headers: BTreeMap<String, String>,
    /// Unix seconds of the last successful origin contact
    pub updated_at: Option<u64>,
    /// Raw response body
    pub body: Bytes,
}

impl CacheEntry {
    // == Constructor ==
    /// Captures a fresh 200/206 origin response.
    pub fn from_response(url: &str, range: &str, response: &HttpResponse, now: u64) -> Self {
        let headers = PRESERVED_HEADERS
            .iter()
            .filter_map(|name| {
                response
                    .header(*name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            url: url.to_string(),
            range: range.to_string(),
            status: Some(response.status.as_u16()),
            etag: response.header(ETAG).map(str::to_string),
            last_modified: response.header(LAST_MODIFIED).map(str::to_string),
            content_md5: Some(content_digest(&response.body)),
            headers,
            updated_at: Some(now),
            body: response.body.clone(),
        }
    }

    /// Status to replay, 200 when the entry predates stored codes.
    pub fn status_code(&self) -> StatusCode {
        self.status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK)
    }

    /// Headers replayed when serving this entry, `Last-Modified` included.
    pub fn replay_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(
                self.last_modified
                    .as_deref()
                    .map(|v| (FIELD_LAST_MODIFIED, v)),
            )
    }

    // == Encode ==
    /// Serializes the entry: sorted metadata lines, blank line, body.
    pub fn encode(&self) -> Vec<u8> {
        let metadata = self.metadata();
        let mut out = Vec::with_capacity(self.body.len() + 64 * (metadata.len() + 1));

        for (key, value) in &metadata {
            out.extend_from_slice(key.as_bytes());
            out.push(b' ');
            out.extend_from_slice(single_line(value).as_bytes());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out
    }

    fn metadata(&self) -> BTreeMap<&str, String> {
        let mut fields: BTreeMap<&str, String> = self
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();

        fields.insert(FIELD_URL, self.url.clone());
        if !self.range.is_empty() {
            fields.insert(FIELD_RANGE, self.range.clone());
        }
        if let Some(code) = self.status {
            fields.insert(FIELD_CODE, code.to_string());
        }
        if let Some(etag) = &self.etag {
            fields.insert(FIELD_ETAG, etag.clone());
        }
        if let Some(last_modified) = &self.last_modified {
            fields.insert(FIELD_LAST_MODIFIED, last_modified.clone());
        }
        if let Some(md5) = &self.content_md5 {
            fields.insert(FIELD_MD5, md5.clone());
        }
        if let Some(updated_at) = self.updated_at {
            fields.insert(FIELD_NO_UPDATE, updated_at.to_string());
        }
        fields
    }

    // == Decode ==
    /// Parses an entry file. Unknown metadata keys are ignored so files from
    /// older and newer writers stay readable.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut pos = 0;

        loop {
            let Some(offset) = data[pos..].iter().position(|&b| b == b'\n') else {
                return Err(CacheError::CorruptEntry(
                    "metadata ended before the blank separator line".to_string(),
                ));
            };
            let line = &data[pos..pos + offset];
            pos += offset + 1;

            if line.is_empty() {
                break;
            }

            let line = std::str::from_utf8(line).map_err(|_| {
                CacheError::CorruptEntry("metadata line is not valid UTF-8".to_string())
            })?;
            let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            fields.insert(key.to_string(), value.trim_start().to_string());
        }

        let body = data.slice(pos..);
        Self::from_fields(fields, body)
    }

    fn from_fields(mut fields: BTreeMap<String, String>, body: Bytes) -> Result<Self> {
        let url = fields
            .remove(FIELD_URL)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| CacheError::CorruptEntry("missing Url field".to_string()))?;

        let headers = PRESERVED_HEADERS
            .iter()
            .filter_map(|name| fields.remove(*name).map(|v| (name.to_string(), v)))
            .collect();

        Ok(Self {
            url,
            range: fields.remove(FIELD_RANGE).unwrap_or_default(),
            status: fields.get(FIELD_CODE).and_then(|v| v.trim().parse().ok()),
            etag: fields.remove(FIELD_ETAG),
            last_modified: fields.remove(FIELD_LAST_MODIFIED),
            content_md5: fields.remove(FIELD_MD5),
            headers,
            updated_at: fields.get(FIELD_NO_UPDATE).and_then(|v| v.trim().parse().ok()),
            body,
        })
    }
}

/// Values are one line each on disk.
fn single_line(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        value.replace(['\r', '\n'], " ").into()
    } else {
        value.into()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
