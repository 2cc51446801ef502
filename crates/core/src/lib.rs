//! # multivec-core
//!
//! Embeddable in-memory vector collections with multiple named vector spaces per
//! point. Each space carries its own dimension, metric and optional HNSW and
//! quantization overrides layered over collection defaults.
//!
//! This is the core library crate with zero async dependencies. Graph builds run
//! through a [`index::BuildExecutor`] supplied by the embedder.

/// Global configuration constants: limits, defaults, and tuning parameters.
pub mod config;
/// Error type shared by every layer.
pub mod error;
/// HNSW approximate nearest neighbor index: graph structure, search, insertion, and distance metrics.
pub mod hnsw;
/// Index mode selection, build tickets and build executors.
pub mod index;
/// Index and quantization parameters with their partial override forms.
pub mod params;
/// Point ids, points and search requests.
pub mod point;
/// Scalar and product quantization codecs.
pub mod quantization;
/// Per-collection registry of named vector spaces.
pub mod registry;
/// Derivation of effective per-space configuration.
pub mod resolver;
/// Storage layer: collections, segments and vector storage.
pub mod storage;

pub use error::{Error, Result};
pub use storage::{Collection, Database};
