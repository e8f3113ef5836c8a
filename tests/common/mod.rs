//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use mini_http_cache::error::{CacheError, Result};
use mini_http_cache::{HttpRequest, HttpResponse, Transport};
use reqwest::header::{HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use reqwest::StatusCode;

/// What the origin saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub url: String,
    pub range: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// Origin stand-in answering from a queue of scripted responses.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn push_error(&self, message: &str) -> &Self {
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, message.to_string());
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(CacheError::transport(error)));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        let header = |name: HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.to_string(),
            url: request.url.clone(),
            range: header(RANGE),
            if_none_match: header(IF_NONE_MATCH),
            if_modified_since: header(IF_MODIFIED_SINCE),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(CacheError::Internal(format!(
                    "unscripted request to {}",
                    request.url
                )))
            })
    }
}

// == Response Builders ==

pub fn ok(body: &'static str) -> HttpResponse {
    HttpResponse::new(StatusCode::OK, Bytes::from_static(body.as_bytes()))
}

pub fn with(response: HttpResponse, name: &'static str, value: &'static str) -> HttpResponse {
    response.with_header(
        HeaderName::from_static(name),
        HeaderValue::from_static(value),
    )
}

pub fn not_modified() -> HttpResponse {
    HttpResponse::new(StatusCode::NOT_MODIFIED, Bytes::new())
}

pub fn status(code: u16, body: &'static str) -> HttpResponse {
    HttpResponse::new(
        StatusCode::from_u16(code).unwrap(),
        Bytes::from_static(body.as_bytes()),
    )
}
