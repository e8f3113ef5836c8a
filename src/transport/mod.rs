//! Transport Module
//!
//! The "perform a request" capability the cache sits in front of, plus a
//! reqwest-backed implementation talking to real origins.

mod client;
mod message;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use client::ReqwestTransport;
pub use message::{Delivery, HttpRequest, HttpResponse};

// == Transport Trait ==
/// Performs a single HTTP request and returns the buffered response.
///
/// Timeouts, redirects and connection reuse are the implementation's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).perform(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).perform(request).await
    }
}

/// Type-erased transport shared across tasks.
pub type SharedTransport = Arc<dyn Transport>;
