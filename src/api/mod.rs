//! API Module
//!
//! HTTP handlers and routing for the caching gateway.
//!
//! # Endpoints
//! - `GET /fetch` - Fetch a URL through the cache
//! - `GET /entries` - Inspect a stored entry
//! - `DELETE /entries` - Delete a stored entry
//! - `POST /sweep` - Run an eviction sweep
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
