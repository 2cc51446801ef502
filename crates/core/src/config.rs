//! Global configuration constants for multivec.
//!
//! Documented parameter defaults, input validation limits, and server defaults live here.
//! These are compile-time constants; per-collection and per-space parameters are
//! resolved at runtime by [`crate::resolver::EffectiveConfigResolver`], and server
//! settings come from CLI arguments and environment variables in the server binary.

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: u32 = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCT: u32 = 100;

/// Default live point count below which a segment is served by a flat scan.
///
/// Also the indexing threshold used when neither the collection nor the
/// process-wide defaults configure one.
pub const HNSW_DEFAULT_FULL_SCAN_THRESHOLD: u32 = 10_000;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: u32 = 16;

/// Default ef parameter during HNSW search when the request does not set `hnsw_ef`.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 64;

/// Accepted range for the per-request `hnsw_ef` search parameter.
pub const HNSW_EF_SEARCH_RANGE: std::ops::RangeInclusive<usize> = 1..=10_000;

/// Accepted range for the HNSW `m` parameter.
pub const HNSW_M_RANGE: std::ops::RangeInclusive<u32> = 4..=128;

/// Accepted range for the HNSW `ef_construct` parameter.
pub const HNSW_EF_CONSTRUCT_RANGE: std::ops::RangeInclusive<u32> = 4..=2_000;

/// Accepted range for the HNSW `max_layers` parameter.
pub const HNSW_MAX_LAYERS_RANGE: std::ops::RangeInclusive<u32> = 1..=64;

/// Number of graph insertions between cancellation checks during an index build.
pub const BUILD_CANCEL_CHECK_INTERVAL: usize = 64;

/// Default scalar quantization quantile: keep the full value range.
pub const SCALAR_DEFAULT_QUANTILE: f32 = 1.0;

/// Number of centroids per product quantization subspace (one byte per code).
pub const PQ_NUM_CENTROIDS: usize = 256;

/// Number of Lloyd iterations when training a product quantization codebook.
pub const PQ_KMEANS_ITERATIONS: usize = 12;

/// Maximum number of vectors sampled to train a product quantization codebook.
pub const PQ_MAX_TRAINING_SAMPLES: usize = 20_000;

/// Fixed seed for codebook training so rebuilds over the same data agree.
pub const PQ_TRAINING_SEED: u64 = 0x6d75_6c74_6976_6563;

/// Fraction of the indexing threshold used as the demotion margin.
///
/// A ready graph only goes stale once the live count falls below
/// `threshold - ceil(threshold * INDEXING_HYSTERESIS_RATIO)`.
pub const INDEXING_HYSTERESIS_RATIO: f64 = 0.1;

/// Default candidate multiplier when quantized search results are rescored.
pub const DEFAULT_QUANTIZATION_OVERSAMPLING: f32 = 2.0;

/// Accepted range for the per-request quantization `oversampling` parameter.
pub const QUANTIZATION_OVERSAMPLING_RANGE: std::ops::RangeInclusive<f32> = 1.0..=100.0;

/// Share of tombstoned rows above which a space's storage is compacted.
///
/// Re-upserts and deletes leave tombstones behind. A flat space compacts in
/// place on the write path; a space serving a graph schedules a rebuild over
/// the live rows and keeps serving the old graph until it is published.
pub const COMPACTION_DELETED_RATIO: f64 = 0.5;

/// Row count below which storage is never compacted.
pub const COMPACTION_MIN_ROWS: usize = 256;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: u32 = 65_536;

/// Maximum length of a vector space name in bytes.
pub const MAX_VECTOR_NAME_LEN: usize = 128;

/// Maximum length of a collection name in characters.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Maximum number of results per search request.
pub const MAX_LIMIT: usize = 10_000;

/// Maximum number of points per upsert request.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Default number of segments a collection's points are spread over.
pub const DEFAULT_SEGMENT_NUMBER: usize = 2;

/// Maximum number of segments per collection.
pub const MAX_SEGMENT_NUMBER: usize = 64;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 6333;

/// Default number of concurrent index builds in the server.
pub const DEFAULT_BUILD_WORKERS: usize = 2;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum request body size in bytes (32 MiB).
pub const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Maximum number of requests processed concurrently by the server.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;
