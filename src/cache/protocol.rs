//! Freshness & Validation Protocol
//!
//! [`CachingTransport`] wraps another [`Transport`] and answers buffered GET
//! requests from the disk store whenever the origin confirms, or may be
//! assumed to confirm, that the stored body is still current.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::StatusCode;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp, sweep_directory, CacheEntry, CacheKey, CacheStats, DiskStore, SweepReport,
    X_CACHED, X_CONTENT_UNCHANGED,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Decides whether a fresh 200/206 body may replace the stored one.
pub type ContentApproval = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

// == Caching Transport ==
/// Transport decorator implementing the caching protocol.
///
/// Per cacheable request:
/// 1. a stored entry for the same URL and range supplies validators;
/// 2. inside the no-update window the entry is served without any network I/O;
/// 3. otherwise the request goes out with `If-Modified-Since`/`If-None-Match`;
/// 4. a 304 serves the entry and refreshes its timestamp, a 200/206 replaces
///    it, anything else passes through and leaves the store alone.
pub struct CachingTransport<T> {
    inner: T,
    store: DiskStore,
    config: CacheConfig,
    approval: Option<ContentApproval>,
    stats: RwLock<CacheStats>,
}

impl<T: Transport> CachingTransport<T> {
    // == Constructor ==
    /// Wraps `inner`, opening (and creating) the configured cache directory.
    pub fn new(inner: T, config: CacheConfig) -> Result<Self> {
        let store = DiskStore::open(&config.base_path)?;
        info!(
            "HTTP cache at {} (max_age={}h, no_update={}s)",
            store.base_path().display(),
            config.max_age_hours,
            config.no_update_secs
        );

        Ok(Self {
            inner,
            store,
            config,
            approval: None,
            stats: RwLock::new(CacheStats::new()),
        })
    }

    /// Installs a predicate that may veto storing a fresh body. A vetoed body
    /// is replaced by the stored entry when one exists.
    pub fn with_content_approval<F>(mut self, approve: F) -> Self
    where
        F: Fn(&HttpResponse) -> bool + Send + Sync + 'static,
    {
        self.approval = Some(Arc::new(approve));
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &DiskStore {
        &self.store
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = match self.on_store(|store| store.len()).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Cannot count cache entries: {}", e);
                0
            }
        };
        let mut stats = self.stats.read().await.clone();
        stats.set_total_entries(total_entries);
        stats
    }

    /// Runs a filesystem operation on the blocking pool.
    async fn on_store<F, R>(&self, op: F) -> Result<R>
    where
        F: FnOnce(DiskStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|e| CacheError::Internal(format!("Store task failed: {e}")))
    }

    // == Inspection ==
    /// Returns the stored entry for `url` and `range` without marking it used.
    pub fn entry(&self, url: &str, range: Option<&str>) -> Option<(CacheKey, CacheEntry)> {
        let key = CacheKey::derive(url, range);
        self.store
            .read(&key)
            .filter(|entry| entry.url == url)
            .map(|entry| (key, entry))
    }

    /// Deletes the stored entry for `url` and `range`. Entries belonging to a
    /// colliding URL are left in place.
    pub fn purge(&self, url: &str, range: Option<&str>) -> Result<bool> {
        match self.entry(url, range) {
            Some((key, _)) => self.store.remove(&key),
            None => Ok(false),
        }
    }

    // == Sweep ==
    /// Runs the eviction sweep over the cache directory.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let dir = self.store.base_path().to_path_buf();
        let max_age_hours = self.config.max_age_hours;

        let report = tokio::task::spawn_blocking(move || sweep_directory(&dir, max_age_hours))
            .await
            .map_err(|e| CacheError::Internal(format!("Sweep task failed: {e}")))??;

        self.stats.write().await.record_evictions(report.removed);
        Ok(report)
    }

    // == Protocol ==
    async fn perform_cached(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let range = request.range().unwrap_or_default().to_string();
        let key = CacheKey::derive(&url, Some(&range));
        let cached = self.usable_entry(&key, &url, &range).await?;

        if let Some(entry) = &cached {
            if self.within_no_update_window(entry, current_timestamp()) {
                self.progress(&url, "fresh within no-update window, origin not contacted");
                self.stats.write().await.record_hit();
                return Ok(self.serve_stored(&key, entry).await);
            }
            add_validators(&mut request, entry);
        }

        let response = self.inner.perform(request).await?;
        let status = response.status;

        match status {
            StatusCode::NOT_MODIFIED => match cached {
                Some(mut entry) => {
                    self.progress(&url, "not modified, serving stored body");
                    let served = reconstitute(&entry);
                    entry.updated_at = Some(current_timestamp());
                    // Rewriting the file also marks it used
                    let write_key = key.clone();
                    self.on_store(move |store| store.write(&write_key, &entry))
                        .await??;
                    self.stats.write().await.record_revalidated();
                    Ok(served)
                }
                None => {
                    debug!("{}: 304 without a stored entry, passing through", url);
                    Ok(response)
                }
            },
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {
                self.store_fresh(&key, &url, &range, cached, response).await
            }
            _ => {
                self.progress(&url, &format!("status {status}, not cached"));
                Ok(response)
            }
        }
    }

    /// Stored entry for this exact URL and range, if any.
    async fn usable_entry(
        &self,
        key: &CacheKey,
        url: &str,
        range: &str,
    ) -> Result<Option<CacheEntry>> {
        let read_key = key.clone();
        let Some(entry) = self.on_store(move |store| store.read(&read_key)).await? else {
            return Ok(None);
        };

        if entry.url != url {
            warn!(
                "Cache key collision on {}: stored {}, requested {}",
                key, entry.url, url
            );
            self.stats.write().await.record_collision();
            return Ok(None);
        }

        if entry.range != range {
            debug!(
                "{}: stored range {:?} differs from requested {:?}",
                url, entry.range, range
            );
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn within_no_update_window(&self, entry: &CacheEntry, now: u64) -> bool {
        let window = self.config.no_update_secs;
        window > 0
            && entry
                .updated_at
                .is_some_and(|updated| now.saturating_sub(updated) < window)
    }

    async fn store_fresh(
        &self,
        key: &CacheKey,
        url: &str,
        range: &str,
        cached: Option<CacheEntry>,
        mut response: HttpResponse,
    ) -> Result<HttpResponse> {
        if let Some(approve) = &self.approval {
            if !approve(&response) {
                let Some(entry) = cached else {
                    warn!("{}: content rejected and nothing stored, passing through", url);
                    return Ok(response);
                };
                warn!("{}: content rejected, serving stored entry", url);
                let mut served = self.serve_stored(key, &entry).await;
                served.headers.remove(X_CONTENT_UNCHANGED);
                self.stats.write().await.record_hit();
                return Ok(served);
            }
        }

        let entry = CacheEntry::from_response(url, range, &response, current_timestamp());
        let unchanged = cached
            .as_ref()
            .and_then(|stored| stored.content_md5.as_deref())
            .is_some_and(|stored| entry.content_md5.as_deref() == Some(stored));

        let write_key = key.clone();
        self.on_store(move |store| store.write(&write_key, &entry))
            .await??;

        let mut stats = self.stats.write().await;
        stats.record_miss();
        if unchanged {
            self.progress(url, "refetched body identical to stored version");
            stats.record_unchanged();
            response
                .headers
                .insert(HeaderName::from_static(X_CONTENT_UNCHANGED), flag());
        } else {
            self.progress(url, "stored new content");
        }

        Ok(response)
    }

    /// Builds the response for a stored entry and marks the entry used.
    async fn serve_stored(&self, key: &CacheKey, entry: &CacheEntry) -> HttpResponse {
        let touch_key = key.clone();
        if let Err(e) = self.on_store(move |store| store.touch(&touch_key)).await {
            debug!("Cannot touch cache entry {}: {}", key, e);
        }
        reconstitute(entry)
    }

    fn progress(&self, url: &str, message: &str) {
        if self.config.verbose {
            info!("{}: {}", url, message);
        } else {
            debug!("{}: {}", url, message);
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for CachingTransport<T> {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        if !request.is_cacheable() {
            debug!("{} {}: bypassing cache", request.method, request.url);
            self.stats.write().await.record_bypass();
            return self.inner.perform(request).await;
        }

        self.perform_cached(request).await
    }
}

// == Reconstitute ==
/// Builds the response replaying a stored entry.
fn reconstitute(entry: &CacheEntry) -> HttpResponse {
    let mut response = HttpResponse::new(entry.status_code(), entry.body.clone());

    for (name, value) in entry.replay_headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers.insert(name, value);
            }
            _ => debug!("Skipping stored header {} for {}", name, entry.url),
        }
    }

    response
        .headers
        .insert(HeaderName::from_static(X_CACHED), flag());
    response
        .headers
        .insert(HeaderName::from_static(X_CONTENT_UNCHANGED), flag());
    response
}

fn add_validators(request: &mut HttpRequest, entry: &CacheEntry) {
    let validators = [
        (IF_MODIFIED_SINCE, entry.last_modified.as_deref()),
        (IF_NONE_MATCH, entry.etag.as_deref()),
    ];

    for (name, value) in validators {
        if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
            request.headers.insert(name, value);
        }
    }
}

fn flag() -> HeaderValue {
    HeaderValue::from_static("1")
}
