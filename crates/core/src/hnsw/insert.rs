//! HNSW insertion algorithm.
//!
//! Inserts a node into the HNSW graph with bidirectional connections and
//! heuristic neighbor pruning (Algorithm 4 from the HNSW paper). Distances are
//! taken from the caller's [`VectorSource`], which may be exact or quantized.

use std::collections::HashSet;

use crate::hnsw::graph::{HnswGraph, VectorSource};
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;

impl HnswGraph {
    /// Link node `id` into the graph.
    ///
    /// `id` must equal `node_count` before this call; node ids mirror storage offsets.
    pub fn insert<S: VectorSource + ?Sized>(&mut self, id: u32, source: &S) {
        let level = self.random_level();

        let Some(entry_point) = self.entry_point else {
            self.push_node(id, level, vec![Vec::new(); level + 1]);
            self.entry_point = Some(id);
            self.max_layer = level;
            return;
        };

        let dist = source.node_scorer(id);
        let mut current_ep = entry_point;
        let mut visited = VisitedSet::new(self.node_count as usize);

        // Phase 1: greedy descent from the top layer down to the node's level + 1
        for layer in (level + 1..=self.max_layer).rev() {
            let results = search_layer(
                self,
                &*dist,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, nearest)) = results.first() {
                current_ep = nearest;
            }
        }

        // Phase 2: collect neighbors on every layer the node lives on
        let top = level.min(self.max_layer);
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u32> = vec![current_ep];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                &*dist,
                &layer_eps,
                self.ef_construct,
                layer,
                &mut visited,
            );

            let selected = select_neighbors_heuristic(source, &candidates, self.layer_capacity(layer));
            node_neighbors[layer] = selected.iter().map(|&(_, nid)| nid).collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, nid)| nid));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }
        drop(dist);

        self.push_node(id, level, node_neighbors);

        // Phase 3: bidirectional links, pruning neighbors that went over capacity
        for layer in 0..=top {
            let m_max = self.layer_capacity(layer);
            let my_neighbors = self.neighbors[id as usize][layer].clone();
            for neighbor_id in my_neighbors {
                let nid = neighbor_id as usize;
                while self.neighbors[nid].len() <= layer {
                    self.neighbors[nid].push(Vec::new());
                }
                self.neighbors[nid][layer].push(id);

                if self.neighbors[nid][layer].len() > m_max {
                    let from_neighbor = source.node_scorer(neighbor_id);
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&cid| (from_neighbor(cid), cid))
                        .collect();
                    let pruned = select_neighbors_heuristic(source, &candidates, m_max);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, cid)| cid).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id);
        }
    }
}

/// Heuristic neighbor selection (Algorithm 4 from the HNSW paper).
///
/// A candidate is selected only if it is closer to the base node than to any
/// already-selected neighbor; remaining slots are filled with the closest leftovers.
fn select_neighbors_heuristic<S: VectorSource + ?Sized>(
    source: &S,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);

    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let from_candidate = source.node_scorer(cid);
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base <= from_candidate(sid));
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        let selected_ids: HashSet<u32> = selected.iter().map(|&(_, id)| id).collect();
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected_ids.contains(&cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}
