//! Index and quantization parameters, their partial override forms, and the
//! collection-level request types built from them.
//!
//! Every parameter record comes in two shapes: a fully specified one (`HnswParams`,
//! `QuantizationParams`) and a partial one whose fields are all optional
//! (`PartialHnswParams`, `PartialQuantizationParams`). Partial records are what users
//! declare and what gets echoed back; full records only exist after resolution.

/// Collection defaults, creation and reconfiguration requests.
pub mod collection;
/// HNSW parameters and overrides.
pub mod hnsw;
/// The `Overlay` trait and its field-list macro.
pub mod overlay;
/// Scalar and product quantization parameters and overrides.
pub mod quantization;
/// Single or named vector space declarations.
pub mod vectors;

pub use collection::{
    CollectionDefaults, CollectionUpdate, CreateCollection, DefaultsUpdate, OptimizersConfig,
    OptimizersConfigUpdate, QuantizationUpdate, VectorSpaceUpdate,
};
pub use hnsw::{HnswParams, PartialHnswParams};
pub use overlay::{merge, Overlay};
pub use quantization::{
    CompressionRatio, MethodDefaults, PartialProductQuantization, PartialQuantizationParams,
    PartialScalarQuantization, ProductQuantization, QuantizationMethod, QuantizationParams,
    ScalarQuantization, ScalarType,
};
pub use vectors::{VectorParams, VectorsConfig, DEFAULT_VECTOR_NAME};
