//! HNSW graph structure.
//!
//! [`HnswGraph`] stores only topology using a Struct-of-Arrays layout: neighbor
//! lists, layer assignments and tombstones indexed by node id. Node ids are the
//! storage offsets of the owning vector storage, so the graph never copies vectors;
//! distances come from a [`VectorSource`] supplied by the caller.

use crate::params::HnswParams;

/// Provides distances between a query or a stored node and stored nodes.
///
/// All distances follow the crate convention: lower is closer.
pub trait VectorSource {
    /// Scorer measuring the distance from `query` to stored node ids.
    fn query_scorer<'a>(&'a self, query: &'a [f32]) -> Box<dyn Fn(u32) -> f32 + 'a>;

    /// Scorer measuring the distance from stored node `id` to other stored node ids.
    fn node_scorer(&self, id: u32) -> Box<dyn Fn(u32) -> f32 + '_>;
}

/// HNSW graph topology using Struct-of-Arrays (SoA) layout.
#[derive(Debug, Clone)]
pub struct HnswGraph {
    /// Links per node on upper layers.
    pub m: usize,
    /// Links per node on layer 0 (`2 * m`).
    pub m_max0: usize,
    pub ef_construct: usize,
    pub max_layers: usize,
    pub neighbors: Vec<Vec<Vec<u32>>>, // [node_id][layer][neighbor_ids]
    pub layers: Vec<u8>,
    pub deleted: Vec<bool>,
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    pub node_count: u32,
    live: usize,
}

impl HnswGraph {
    /// Creates an empty graph for the given parameters.
    pub fn new(params: &HnswParams) -> Self {
        let m = params.m as usize;
        Self {
            m,
            m_max0: m * 2,
            ef_construct: params.ef_construct as usize,
            max_layers: params.max_layers.max(1) as usize,
            neighbors: Vec::new(),
            layers: Vec::new(),
            deleted: Vec::new(),
            entry_point: None,
            max_layer: 0,
            node_count: 0,
            live: 0,
        }
    }

    /// Returns the number of non-deleted nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the graph contains no non-deleted nodes.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Generate a random layer for a new node using exponential distribution.
    pub fn random_level(&self) -> usize {
        let ml = 1.0 / (self.m as f64).ln();
        let r: f64 = rand::random();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.max_layers - 1)
    }

    /// Returns `true` if the node has been soft-deleted.
    #[inline]
    pub fn is_deleted(&self, id: u32) -> bool {
        self.deleted[id as usize]
    }

    /// Max links for a node on `layer`.
    #[inline]
    pub(crate) fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Mark a node as deleted. It keeps routing searches but never appears in results.
    pub fn mark_deleted(&mut self, id: u32) -> bool {
        match self.deleted.get_mut(id as usize) {
            Some(flag) if !*flag => {
                *flag = true;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Reserve node `id` without linking it, for storage rows that are already deleted.
    pub fn push_isolated(&mut self, id: u32) {
        debug_assert_eq!(id, self.node_count);
        self.neighbors.push(vec![Vec::new()]);
        self.layers.push(0);
        self.deleted.push(true);
        self.node_count += 1;
    }

    /// Append a linked node's SoA fields.
    pub(crate) fn push_node(&mut self, id: u32, level: usize, links: Vec<Vec<u32>>) {
        debug_assert_eq!(id, self.node_count);
        self.neighbors.push(links);
        self.layers.push(level as u8);
        self.deleted.push(false);
        self.node_count += 1;
        self.live += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_level_respects_max_layers() {
        let params = HnswParams {
            max_layers: 2,
            ..HnswParams::default()
        };
        let graph = HnswGraph::new(&params);
        for _ in 0..1_000 {
            assert!(graph.random_level() < 2);
        }
    }

    #[test]
    fn test_isolated_and_deleted_nodes_are_not_live() {
        let mut graph = HnswGraph::new(&HnswParams::default());
        graph.push_isolated(0);
        graph.push_node(1, 0, vec![Vec::new()]);
        assert_eq!(graph.node_count, 2);
        assert_eq!(graph.len(), 1);
        assert!(graph.mark_deleted(1));
        assert!(!graph.mark_deleted(1));
        assert!(graph.is_empty());
    }
}
