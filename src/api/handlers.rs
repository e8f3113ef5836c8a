//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::CachingTransport;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, EntryQuery, EntryResponse, HealthResponse, StatsResponse, SweepResponse,
};
use crate::transport::{HttpRequest, HttpResponse, SharedTransport, Transport};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Caching transport in front of the origin client
    pub cache: Arc<CachingTransport<SharedTransport>>,
}

impl AppState {
    /// Creates a new AppState around the given caching transport.
    pub fn new(cache: CachingTransport<SharedTransport>) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration, fetching through `origin`.
    ///
    /// Fails when the cache directory can't be opened.
    pub fn from_config(config: &Config, origin: SharedTransport) -> Result<Self> {
        let cache = CachingTransport::new(origin, config.cache.clone())?;
        Ok(Self::new(cache))
    }
}

// == Response Conversion ==
impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        // Framing is recomputed for the buffered body
        for name in [CONNECTION, TRANSFER_ENCODING, CONTENT_LENGTH] {
            headers.remove(name);
        }
        (self.status, headers, self.body).into_response()
    }
}

/// Runs a cache directory operation off the async worker threads.
async fn blocking<F, R>(op: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| CacheError::Internal(format!("Store task failed: {e}")))
}

fn checked(query: &EntryQuery) -> Result<()> {
    match query.validate() {
        Some(error_msg) => Err(CacheError::InvalidRequest(error_msg)),
        None => Ok(()),
    }
}

/// Handler for GET /fetch
///
/// Fetches `url` through the cache and relays the origin's (or the stored)
/// status, headers and body.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<HttpResponse> {
    checked(&query)?;

    let mut request = HttpRequest::get(&query.url);
    if let Some(range) = query.range() {
        request = request.with_range(range)?;
    }

    state.cache.perform(request).await
}

/// Handler for GET /entries
///
/// Returns the metadata of the stored entry for `url` and `range`.
pub async fn entry_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<EntryResponse>> {
    checked(&query)?;

    let cache = state.cache.clone();
    let lookup = query.clone();
    let (key, entry) = blocking(move || cache.entry(&lookup.url, lookup.range()))
        .await?
        .ok_or_else(|| CacheError::NotFound(format!("No entry for '{}'", query.url)))?;

    Ok(Json(EntryResponse::new(&key, &entry)))
}

/// Handler for DELETE /entries
///
/// Deletes the stored entry for `url` and `range`.
pub async fn purge_handler(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<DeleteResponse>> {
    checked(&query)?;

    let cache = state.cache.clone();
    let lookup = query.clone();
    if !blocking(move || cache.purge(&lookup.url, lookup.range())).await?? {
        return Err(CacheError::NotFound(format!("No entry for '{}'", query.url)));
    }

    Ok(Json(DeleteResponse::new(query.url)))
}

/// Handler for POST /sweep
///
/// Runs an eviction sweep immediately.
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let report = state.cache.sweep().await?;
    Ok(Json(SweepResponse::new(
        state.cache.config().max_age_hours,
        report,
    )))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
