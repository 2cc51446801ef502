//! Generation-based visited set for graph traversal.
//!
//! Each `clear()` bumps a generation counter instead of zeroing the array, so a
//! set reused across searches costs O(1) per reset.

/// Visited marks stored as the generation that last touched each node.
/// The u16 generation forces a full memset only every 65534 clears.
#[derive(Debug)]
pub struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u16; capacity],
            generation: 1,
        }
    }

    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Mark `id` as visited, growing as needed. Returns `true` if it was not visited yet.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let idx = id as usize;
        if idx >= self.data.len() {
            self.data.resize((idx + 1).next_power_of_two(), 0);
        }
        if self.data[idx] == self.generation {
            false
        } else {
            self.data[idx] = self.generation;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_grows_and_clear_resets() {
        let mut vs = VisitedSet::new(0);
        assert!(vs.insert(40));
        assert!(!vs.insert(40));
        vs.clear();
        assert!(vs.insert(40));
    }

    #[test]
    fn test_generation_wraparound() {
        let mut vs = VisitedSet::new(10);
        for _ in 0..65534 {
            vs.clear();
        }
        assert_eq!(vs.generation, u16::MAX);
        vs.insert(5);
        vs.clear();
        assert_eq!(vs.generation, 1);
        assert!(vs.insert(5));
    }
}
