//! HNSW search algorithms: single-layer search and multi-layer KNN.
//!
//! Deleted nodes are still used for navigation but excluded from results.
//! Distances come from a caller-supplied scorer, so the same traversal runs over
//! exact vectors, scalar codes or product-quantization lookup tables.

use std::cell::RefCell;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::visited::VisitedSet;

thread_local! {
    /// Thread-local VisitedSet reused across searches on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// A candidate during search. BinaryHeap is a max-heap; negative distance gives min-heap order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    id: u32,
}

/// A result entry. Max-heap by distance for pruning the worst result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u32,
}

/// Search a single layer of the graph.
///
/// Returns up to `ef` closest non-deleted nodes, sorted by ascending distance.
/// `visited` is cleared at the start of each call.
pub fn search_layer<D: Fn(u32) -> f32 + ?Sized>(
    graph: &HnswGraph,
    dist: &D,
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.clear();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef.saturating_mul(2));
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef.saturating_add(1));
    // Cached worst distance, avoids repeated heap peeks in the hot loop
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let d = dist(ep);
            candidates.push(Candidate {
                neg_distance: OrderedFloat(-d),
                id: ep,
            });
            if !graph.is_deleted(ep) {
                results.push(ResultEntry {
                    distance: OrderedFloat(d),
                    id: ep,
                });
                if results.len() > ef {
                    results.pop();
                }
                if results.len() >= ef {
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        let Some(neighbor_list) = graph.neighbors[candidate.id as usize].get(layer) else {
            continue;
        };

        for &neighbor_id in neighbor_list {
            if !visited.insert(neighbor_id) {
                continue;
            }

            let d = dist(neighbor_id);
            if results.len() < ef || d < worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-d),
                    id: neighbor_id,
                });
                if !graph.is_deleted(neighbor_id) {
                    results.push(ResultEntry {
                        distance: OrderedFloat(d),
                        id: neighbor_id,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    if results.len() >= ef {
                        worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                    }
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

impl HnswGraph {
    /// Multi-layer KNN search. Returns up to `k` `(distance, node_id)` pairs, closest first.
    ///
    /// Uses adaptive ef: when tombstones leave fewer than `k` results, the layer-0
    /// search is retried with a doubled ef, up to four times the base.
    pub fn search<D: Fn(u32) -> f32 + ?Sized>(
        &self,
        dist: &D,
        k: usize,
        ef_search: usize,
    ) -> Vec<(f32, u32)> {
        let Some(entry_point) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        SEARCH_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();

            let mut current_ep = entry_point;
            for layer in (1..=self.max_layer).rev() {
                let results = search_layer(
                    self,
                    dist,
                    std::slice::from_ref(&current_ep),
                    1,
                    layer,
                    &mut visited,
                );
                if let Some(&(_, nearest)) = results.first() {
                    current_ep = nearest;
                }
            }

            let base_ef = ef_search.max(k).min((self.node_count as usize).max(1));
            let max_ef = base_ef
                .saturating_mul(4)
                .min((self.node_count as usize).max(base_ef));
            let mut ef = base_ef;
            let mut results;
            loop {
                results = search_layer(
                    self,
                    dist,
                    std::slice::from_ref(&current_ep),
                    ef,
                    0,
                    &mut visited,
                );
                if results.len() >= k || ef >= max_ef {
                    break;
                }
                ef = ef.saturating_mul(2).min(max_ef);
            }

            results.truncate(k);
            results
        })
    }
}
