//! Brute-force top-k selection.

use std::collections::BinaryHeap;
use std::convert::Infallible;

use ordered_float::OrderedFloat;

/// Keep the `k` candidates with the lowest distance, sorted ascending.
///
/// The scorer may fail (disk-resident rows); the first error aborts the scan.
pub fn try_search<I, D, E>(candidates: I, mut dist: D, k: usize) -> Result<Vec<(f32, u32)>, E>
where
    I: IntoIterator<Item = u32>,
    D: FnMut(u32) -> Result<f32, E>,
{
    if k == 0 {
        return Ok(Vec::new());
    }
    // Max-heap on distance: the root is the worst of the current top-k.
    let mut heap: BinaryHeap<(OrderedFloat<f32>, u32)> =
        BinaryHeap::with_capacity(k.saturating_add(1));
    for id in candidates {
        let d = OrderedFloat(dist(id)?);
        if heap.len() < k {
            heap.push((d, id));
        } else if let Some(&(worst, _)) = heap.peek() {
            if d < worst {
                heap.pop();
                heap.push((d, id));
            }
        }
    }
    let mut results: Vec<(f32, u32)> = heap.into_iter().map(|(d, id)| (d.0, id)).collect();
    results.sort_by(|a, b| OrderedFloat(a.0).cmp(&OrderedFloat(b.0)).then(a.1.cmp(&b.1)));
    Ok(results)
}

/// Infallible variant of [`try_search`].
pub fn search<I, D>(candidates: I, dist: D, k: usize) -> Vec<(f32, u32)>
where
    I: IntoIterator<Item = u32>,
    D: Fn(u32) -> f32,
{
    match try_search::<_, _, Infallible>(candidates, |id| Ok(dist(id)), k) {
        Ok(results) => results,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_k_closest_sorted() {
        let values = [5.0f32, 1.0, 4.0, 0.5, 3.0];
        let top = search(0..values.len() as u32, |id| values[id as usize], 3);
        assert_eq!(top, vec![(0.5, 3), (1.0, 1), (3.0, 4)]);
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let top = search([2u32, 7], |id| id as f32, 10);
        assert_eq!(top.len(), 2);
        assert!(search([1u32], |_| 0.0, 0).is_empty());
    }

    #[test]
    fn test_error_aborts() {
        let res: Result<_, &str> = try_search(0..10u32, |id| if id == 4 { Err("io") } else { Ok(id as f32) }, 3);
        assert_eq!(res, Err("io"));
    }
}
