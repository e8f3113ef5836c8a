//! Integration Tests for the Caching Transport
//!
//! Drives `CachingTransport` against a scripted origin, and once against a
//! real local HTTP server through `ReqwestTransport`.

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use filetime::FileTime;
use mini_http_cache::cache::{current_timestamp, CacheEntry, CacheKey};
use mini_http_cache::{
    CacheConfig, CacheError, CachingTransport, HttpRequest, HttpResponse, ReqwestTransport,
    Transport,
};
use reqwest::header::{HeaderValue, IF_NONE_MATCH, RANGE};
use reqwest::{Method, StatusCode};
use tempfile::TempDir;

use common::{not_modified, ok, status, with, ScriptedTransport};

const URL: &str = "http://example.test/a";
const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

// == Helper Functions ==

fn caching(
    temp_dir: &TempDir,
    config: impl FnOnce(CacheConfig) -> CacheConfig,
) -> (ScriptedTransport, CachingTransport<ScriptedTransport>) {
    let origin = ScriptedTransport::new();
    let config = config(CacheConfig::new(temp_dir.path()));
    let cache = CachingTransport::new(origin.clone(), config).unwrap();
    (origin, cache)
}

fn first_response() -> HttpResponse {
    with(
        with(with(ok("hello"), "etag", "\"v1\""), "last-modified", LAST_MODIFIED),
        "content-type",
        "text/plain",
    )
}

fn stored_entry(url: &str, updated_at: Option<u64>) -> CacheEntry {
    CacheEntry {
        url: url.to_string(),
        range: String::new(),
        status: Some(200),
        etag: Some("\"v1\"".to_string()),
        last_modified: None,
        content_md5: None,
        headers: BTreeMap::new(),
        updated_at,
        body: Bytes::from_static(b"stored"),
    }
}

// == Revalidation Tests ==

#[tokio::test]
async fn test_store_then_revalidate_with_304() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(first_response());
    let first = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(&first.body[..], b"hello");
    assert!(!first.is_cached());
    assert!(!first.is_content_unchanged());

    let (key, entry) = cache.entry(URL, None).unwrap();
    assert_eq!(key.as_str(), "e63357d43f8fc6cf43de34fd9323f9bf");
    assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
    assert_eq!(
        entry.content_md5.as_deref(),
        Some("5d41402abc4b2a76b9719d911017c592")
    );

    origin.push(not_modified());
    let second = cache.perform(HttpRequest::get(URL)).await.unwrap();

    let calls = origin.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].if_none_match, None);
    assert_eq!(calls[1].if_none_match.as_deref(), Some("\"v1\""));
    assert_eq!(calls[1].if_modified_since.as_deref(), Some(LAST_MODIFIED));

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(&second.body[..], b"hello");
    assert!(second.is_cached());
    assert!(second.is_content_unchanged());
    assert_eq!(second.header("content-type"), Some("text/plain"));
    assert_eq!(second.header("last-modified"), Some(LAST_MODIFIED));

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.revalidated, 1);
    assert_eq!(stats.total_entries, 1);
}

#[tokio::test]
async fn test_304_refreshes_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    cache.store().write(&key, &stored_entry(URL, Some(1000))).unwrap();

    origin.push(not_modified());
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();
    assert_eq!(&response.body[..], b"stored");

    let (_, entry) = cache.entry(URL, None).unwrap();
    assert!(entry.updated_at.unwrap() > 1000);
    assert!(entry.updated_at.unwrap() <= current_timestamp());
    assert_eq!(&entry.body[..], b"stored");
}

#[tokio::test]
async fn test_304_without_entry_passes_through() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(not_modified());
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert!(!response.is_cached());
    assert!(cache.entry(URL, None).is_none());
}

// == Range Tests ==

#[tokio::test]
async fn test_range_and_full_resource_are_separate_entries() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(with(
        with(status(206, "hello"), "etag", "\"r1\""),
        "content-range",
        "bytes 0-4/11",
    ));
    origin.push(with(ok("hello world"), "etag", "\"f1\""));
    origin.push(not_modified());

    let ranged = HttpRequest::get(URL).with_range("bytes=0-4").unwrap();
    let partial = cache.perform(ranged.clone()).await.unwrap();
    assert_eq!(partial.status, StatusCode::PARTIAL_CONTENT);

    cache.perform(HttpRequest::get(URL)).await.unwrap();
    assert_eq!(cache.store().len(), 2);

    let replay = cache.perform(ranged).await.unwrap();
    assert_eq!(replay.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(&replay.body[..], b"hello");
    assert_eq!(replay.header("content-range"), Some("bytes 0-4/11"));

    let calls = origin.calls();
    assert_eq!(calls[2].range.as_deref(), Some("bytes=0-4"));
    assert_eq!(calls[2].if_none_match.as_deref(), Some("\"r1\""));

    let (_, full) = cache.entry(URL, None).unwrap();
    assert_eq!(&full.body[..], b"hello world");
    let (_, part) = cache.entry(URL, Some("bytes=0-4")).unwrap();
    assert_eq!(part.range, "bytes=0-4");
}

// == No-Update Window Tests ==

#[tokio::test]
async fn test_no_update_window_skips_origin() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c.with_no_update_secs(3600));

    origin.push(first_response());
    cache.perform(HttpRequest::get(URL)).await.unwrap();

    let second = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(origin.call_count(), 1);
    assert!(second.is_cached());
    assert_eq!(&second.body[..], b"hello");
    assert_eq!(cache.stats().await.hits, 1);
}

#[tokio::test]
async fn test_no_update_window_expired_contacts_origin() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c.with_no_update_secs(60));
    let key = CacheKey::derive(URL, None);
    let old = current_timestamp() - 7200;
    cache.store().write(&key, &stored_entry(URL, Some(old))).unwrap();

    origin.push(not_modified());
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(origin.call_count(), 1);
    assert!(response.is_cached());
}

#[tokio::test]
async fn test_entry_without_timestamp_always_revalidates() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c.with_no_update_secs(3600));
    let key = CacheKey::derive(URL, None);
    cache.store().write(&key, &stored_entry(URL, None)).unwrap();

    origin.push(not_modified());
    cache.perform(HttpRequest::get(URL)).await.unwrap();
    assert_eq!(origin.call_count(), 1);
}

// == Change Detection Tests ==

#[tokio::test]
async fn test_identical_refetch_marked_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(with(ok("hello"), "etag", "\"v1\""));
    origin.push(with(ok("hello"), "etag", "\"v2\""));
    origin.push(with(ok("changed"), "etag", "\"v3\""));

    cache.perform(HttpRequest::get(URL)).await.unwrap();

    let same = cache.perform(HttpRequest::get(URL)).await.unwrap();
    assert!(same.is_content_unchanged());
    assert!(!same.is_cached());

    let changed = cache.perform(HttpRequest::get(URL)).await.unwrap();
    assert!(!changed.is_content_unchanged());
    assert_eq!(&changed.body[..], b"changed");

    let (_, entry) = cache.entry(URL, None).unwrap();
    assert_eq!(entry.etag.as_deref(), Some("\"v3\""));

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.unchanged, 1);
}

// == Pass-Through Tests ==

#[tokio::test]
async fn test_other_status_not_stored() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(status(404, "missing"));
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_server_error_leaves_entry_alone() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    cache.store().write(&key, &stored_entry(URL, Some(1000))).unwrap();

    origin.push(status(500, "boom"));
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let (_, entry) = cache.entry(URL, None).unwrap();
    assert_eq!(entry.updated_at, Some(1000));
    assert_eq!(&entry.body[..], b"stored");
}

#[tokio::test]
async fn test_transport_error_never_writes() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push_error("connection reset");
    let result = cache.perform(HttpRequest::get(URL)).await;

    assert!(matches!(result, Err(CacheError::Transport(_))));
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_collision_is_miss_and_not_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    cache
        .store()
        .write(&key, &stored_entry("http://other.test/", Some(1000)))
        .unwrap();

    origin.push(status(503, "unavailable"));
    cache.perform(HttpRequest::get(URL)).await.unwrap();

    let calls = origin.calls();
    assert_eq!(calls[0].if_none_match, None);

    let other = cache.store().read(&key).unwrap();
    assert_eq!(other.url, "http://other.test/");
    assert!(cache.entry(URL, None).is_none());
    assert_eq!(cache.stats().await.collisions, 1);
}

// == Bypass Tests ==

#[tokio::test]
async fn test_post_bypasses_cache() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(ok("created"));
    let response = cache
        .perform(HttpRequest::new(Method::POST, URL))
        .await
        .unwrap();

    assert_eq!(&response.body[..], b"created");
    assert!(cache.store().is_empty());
    assert_eq!(origin.calls()[0].method, "POST");
    assert_eq!(cache.stats().await.bypassed, 1);
}

#[tokio::test]
async fn test_caller_validators_bypass_cache() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    cache.store().write(&key, &stored_entry(URL, Some(1000))).unwrap();

    origin.push(not_modified());
    let request =
        HttpRequest::get(URL).with_header(IF_NONE_MATCH, HeaderValue::from_static("\"mine\""));
    let response = cache.perform(request).await.unwrap();

    // The caller's own 304 comes back untouched
    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert!(!response.is_cached());
    assert_eq!(origin.calls()[0].if_none_match.as_deref(), Some("\"mine\""));
    let (_, entry) = cache.entry(URL, None).unwrap();
    assert_eq!(entry.updated_at, Some(1000));
}

#[tokio::test]
async fn test_streamed_request_bypasses_cache() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(ok("stream"));
    cache
        .perform(HttpRequest::get(URL).streamed())
        .await
        .unwrap();

    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_unreadable_range_never_shares_full_slot() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);

    origin.push(with(status(206, "hel"), "etag", "\"p\""));
    let ranged = HttpRequest::get(URL)
        .with_header(RANGE, HeaderValue::from_bytes(b"bytes=0-2;\xe9").unwrap());
    let partial = cache.perform(ranged).await.unwrap();

    assert_eq!(partial.status, StatusCode::PARTIAL_CONTENT);
    assert!(cache.store().is_empty());
    assert_eq!(cache.stats().await.bypassed, 1);

    // The full resource is fetched without the partial entry's validators
    origin.push(with(ok("hello"), "etag", "\"f\""));
    let full = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(&full.body[..], b"hello");
    assert!(!full.is_cached());
    assert_eq!(origin.calls()[1].if_none_match, None);
}

// == Failure Tests ==

#[tokio::test]
async fn test_write_failure_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    // A directory squatting on the entry path makes the final rename fail
    fs::create_dir(cache.store().path_for(&key)).unwrap();

    origin.push(ok("hello"));
    let result = cache.perform(HttpRequest::get(URL)).await;

    assert!(matches!(result, Err(CacheError::Write { .. })));
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().flatten().collect();
    assert_eq!(leftovers.len(), 1);
    assert!(cache.store().path_for(&key).is_dir());
}

// == Concurrency Tests ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_requests_share_store() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c.with_no_update_secs(3600));
    let cache = Arc::new(cache);

    for _ in 0..8 {
        origin.push(with(ok("hello"), "etag", "\"v1\""));
    }

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let url = format!("http://example.test/item/{i}");
                cache.perform(HttpRequest::get(url)).await
            })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(&response.body[..], b"hello");
    }

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 8);
    assert_eq!(stats.total_entries, 8);

    // Second round is answered from disk inside the no-update window
    let again = cache
        .perform(HttpRequest::get("http://example.test/item/3"))
        .await
        .unwrap();
    assert!(again.is_cached());
    assert_eq!(origin.call_count(), 8);
}

// == Content Approval Tests ==

#[tokio::test]
async fn test_rejected_content_serves_stored_entry() {
    let temp_dir = TempDir::new().unwrap();
    let origin = ScriptedTransport::new();
    let cache = CachingTransport::new(origin.clone(), CacheConfig::new(temp_dir.path()))
        .unwrap()
        .with_content_approval(|response| !response.body.starts_with(b"<error"));

    origin.push(with(ok("good"), "etag", "\"v1\""));
    origin.push(with(ok("<error page>"), "etag", "\"v2\""));

    cache.perform(HttpRequest::get(URL)).await.unwrap();
    let served = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(&served.body[..], b"good");
    assert!(served.is_cached());
    assert!(!served.is_content_unchanged());

    let (_, entry) = cache.entry(URL, None).unwrap();
    assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn test_rejected_content_without_entry_passes_through() {
    let temp_dir = TempDir::new().unwrap();
    let origin = ScriptedTransport::new();
    let cache = CachingTransport::new(origin.clone(), CacheConfig::new(temp_dir.path()))
        .unwrap()
        .with_content_approval(|_| false);

    origin.push(ok("anything"));
    let response = cache.perform(HttpRequest::get(URL)).await.unwrap();

    assert_eq!(&response.body[..], b"anything");
    assert!(!response.is_cached());
    assert!(cache.store().is_empty());
}

// == Maintenance Tests ==

#[tokio::test]
async fn test_purge_and_sweep() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c.with_max_age_hours(1));

    origin.push(ok("a"));
    origin.push(ok("b"));
    cache.perform(HttpRequest::get(URL)).await.unwrap();
    cache
        .perform(HttpRequest::get("http://example.test/b"))
        .await
        .unwrap();

    assert!(cache.purge(URL, None).unwrap());
    assert!(!cache.purge(URL, None).unwrap());

    let key = CacheKey::derive("http://example.test/b", None);
    let stale = SystemTime::now() - Duration::from_secs(3 * 3600);
    filetime::set_file_mtime(
        cache.store().path_for(&key),
        FileTime::from_system_time(stale),
    )
    .unwrap();

    let report = cache.sweep().await.unwrap();
    assert_eq!(report.removed, 1);
    assert!(cache.store().is_empty());
    assert_eq!(cache.stats().await.evictions, 1);
}

#[tokio::test]
async fn test_serving_entry_touches_file() {
    let temp_dir = TempDir::new().unwrap();
    let (origin, cache) = caching(&temp_dir, |c| c);
    let key = CacheKey::derive(URL, None);
    cache.store().write(&key, &stored_entry(URL, Some(1000))).unwrap();
    let path = cache.store().path_for(&key);
    let old = SystemTime::now() - Duration::from_secs(48 * 3600);
    filetime::set_file_mtime(&path, FileTime::from_system_time(old)).unwrap();

    origin.push(not_modified());
    cache.perform(HttpRequest::get(URL)).await.unwrap();

    let mtime = fs::metadata(&path).unwrap().modified().unwrap();
    assert!(mtime > old + Duration::from_secs(47 * 3600));
}

// == End-to-End Tests ==

/// Local origin honouring `If-None-Match` for a single document.
async fn spawn_origin(hits: Arc<AtomicUsize>) -> String {
    use axum::{http::HeaderMap, response::IntoResponse, routing::get, Router};

    let app = Router::new().route(
        "/doc",
        get(move |headers: HeaderMap| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let matches = headers
                    .get("if-none-match")
                    .map(|v| v == "\"doc-1\"")
                    .unwrap_or(false);
                if matches {
                    StatusCode::NOT_MODIFIED.into_response()
                } else {
                    (
                        [("etag", "\"doc-1\""), ("content-type", "text/plain")],
                        "document body",
                    )
                        .into_response()
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/doc")
}

#[tokio::test]
async fn test_end_to_end_with_reqwest_transport() {
    let temp_dir = TempDir::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_origin(hits.clone()).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let cache = CachingTransport::new(
        ReqwestTransport::with_client(client),
        CacheConfig::new(temp_dir.path()),
    )
    .unwrap();

    let first = cache.perform(HttpRequest::get(&url)).await.unwrap();
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(&first.body[..], b"document body");
    assert!(!first.is_cached());

    let second = cache.perform(HttpRequest::get(&url)).await.unwrap();
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(&second.body[..], b"document body");
    assert!(second.is_cached());
    assert_eq!(second.header("content-type"), Some("text/plain"));

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
