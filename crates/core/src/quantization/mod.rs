//! Vector quantization codecs.
//!
//! Scalar quantization compresses each f32 component to u8 with a per-vector
//! clipping range (4× memory reduction). Product quantization learns a codebook per
//! segment and encodes groups of components as single bytes (4× to 64× reduction).
//! Both feed asymmetric distance functions: the query keeps full f32 precision.

/// Product quantization: k-means codebooks, encoding, and lookup-table distances.
pub mod product;
/// Scalar quantization: f32 → u8 with quantile clipping and asymmetric distance functions.
pub mod scalar;

pub use product::{PqDistanceTable, ProductCodebook};
pub use scalar::{QuantizedVector, VectorRef};
