//! multivec-server: HTTP server for multivec collections.
//!
//! Provides the REST API and the tokio-backed graph build executor.
//! Collection logic lives in `multivec-core`.

/// REST API layer: Axum router, HTTP handlers, models, metrics.
pub mod api;
/// Graph builds on the tokio blocking pool.
pub mod executor;
