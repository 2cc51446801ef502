//! Storage layer: collections, segments and per-space vector storage.
//!
//! Points live in-memory in `Collection` instances grouped by a `Database`. Each
//! collection routes points to a fixed set of segments; each segment keeps one
//! `SpaceIndex` per vector space with its own index mode and build state.

/// Collection and database data structures.
pub mod collection;
/// Segments and the per-space index they hold.
pub mod segment;
/// Full-precision rows, tombstones and quantized codes of one vector space.
pub mod vectors;

pub use collection::{
    Collection, CollectionInfo, CollectionOptions, CollectionStatus, Database,
};
pub use segment::{SegmentIndexSet, SpaceIndex};
pub use vectors::VectorStorage;
