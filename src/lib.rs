//! Mini HTTP Cache - A transparent, persistent disk cache for HTTP GET
//!
//! Wraps any [`Transport`] with conditional revalidation, an optional
//! no-update window and age-based eviction, and exposes it as a small
//! caching gateway.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod transport;

pub use api::AppState;
pub use cache::CachingTransport;
pub use config::{CacheConfig, Config};
pub use error::CacheError;
pub use tasks::spawn_sweep_task;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, SharedTransport, Transport};
