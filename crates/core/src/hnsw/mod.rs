//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! The graph holds topology only. Node ids are storage offsets of the vector
//! storage that owns the graph, and every distance is computed through a
//! [`VectorSource`], so one graph implementation serves exact, scalar-quantized and
//! product-quantized storage alike.

/// Distance metrics: cosine, euclidean, dot product and manhattan.
pub mod distance;
/// HNSW graph topology and the [`VectorSource`] seam.
pub mod graph;
/// HNSW insertion with bidirectional connections and heuristic pruning.
pub mod insert;
/// HNSW search: single-layer search and multi-layer KNN.
pub mod search;
/// Generation-based visited set for graph traversal.
pub mod visited;

pub use distance::Distance;
pub use graph::{HnswGraph, VectorSource};
