//! Product quantization (PQ) for compact approximate distance computation.
//!
//! Splits vectors into subspaces whose width follows the configured compression
//! ratio (x4 keeps one float per byte, x64 sixteen) and learns 256 centroids per
//! subspace via k-means. Each vector is encoded as one byte per subspace. Distance
//! computation uses a per-query lookup table: one lookup and one addition per
//! subspace instead of a multiply-add per dimension.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::hnsw::distance::Distance;
use crate::params::CompressionRatio;

/// PQ codebook: subspaces × 256 centroids × `sub_dim` floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCodebook {
    pub dim: usize,
    pub num_subspaces: usize,
    /// Width of every subspace except possibly the last one.
    pub sub_dim: usize,
    /// Flat centroid array with stride `sub_dim`:
    /// `centroids[s * K * sub_dim + k * sub_dim .. + width(s)]`.
    pub centroids: Vec<f32>,
}

/// Precomputed distance table for a single query: `[subspace][centroid]` partial distances.
#[derive(Debug, Clone)]
pub struct PqDistanceTable {
    table: Vec<f32>,
    num_subspaces: usize,
}

impl ProductCodebook {
    /// Train a codebook on `vectors`, a contiguous arena of rows of `dim` floats.
    ///
    /// Returns `None` when there is nothing to train on.
    pub fn train(vectors: &[f32], dim: usize, compression: CompressionRatio) -> Option<Self> {
        if dim == 0 || vectors.len() < dim {
            return None;
        }
        let sub_dim = compression.floats_per_code().min(dim);
        let num_subspaces = dim.div_ceil(sub_dim);
        let k = config::PQ_NUM_CENTROIDS;
        let n_total = vectors.len() / dim;

        let mut rng = StdRng::seed_from_u64(config::PQ_TRAINING_SEED);
        let sample: Vec<usize> = if n_total > config::PQ_MAX_TRAINING_SAMPLES {
            rand::seq::index::sample(&mut rng, n_total, config::PQ_MAX_TRAINING_SAMPLES)
                .into_vec()
        } else {
            (0..n_total).collect()
        };
        let n = sample.len();

        let mut codebook = Self {
            dim,
            num_subspaces,
            sub_dim,
            centroids: vec![0.0f32; num_subspaces * k * sub_dim],
        };

        for sub in 0..num_subspaces {
            let range = codebook.subspace(sub);
            let width = range.len();
            let mut sub_vectors = Vec::with_capacity(n * width);
            for &row in &sample {
                sub_vectors.extend_from_slice(&vectors[row * dim + range.start..row * dim + range.end]);
            }

            let effective_k = k.min(n);
            let sub_centroids = kmeans(&sub_vectors, width, effective_k, &mut rng);

            for ci in 0..effective_k {
                let dst = sub * k * sub_dim + ci * sub_dim;
                codebook.centroids[dst..dst + width]
                    .copy_from_slice(&sub_centroids[ci * width..(ci + 1) * width]);
            }
        }

        Some(codebook)
    }

    /// Dimension range covered by subspace `sub`.
    #[inline]
    pub fn subspace(&self, sub: usize) -> Range<usize> {
        sub * self.sub_dim..((sub + 1) * self.sub_dim).min(self.dim)
    }

    #[inline]
    fn centroid(&self, sub: usize, ci: usize) -> &[f32] {
        let width = self.subspace(sub).len();
        let start = sub * config::PQ_NUM_CENTROIDS * self.sub_dim + ci * self.sub_dim;
        &self.centroids[start..start + width]
    }

    /// Encode a single vector into one code per subspace.
    pub fn encode(&self, vector: &[f32]) -> Vec<u8> {
        (0..self.num_subspaces)
            .map(|sub| self.find_nearest_centroid(sub, &vector[self.subspace(sub)]))
            .collect()
    }

    /// Reconstruct an approximate vector from its codes.
    pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dim);
        for (sub, &code) in codes.iter().enumerate().take(self.num_subspaces) {
            out.extend_from_slice(self.centroid(sub, code as usize));
        }
        out
    }

    /// Build the distance lookup table for a query vector.
    ///
    /// Entries follow the crate convention: lower is closer.
    pub fn build_distance_table(&self, query: &[f32], distance: Distance) -> PqDistanceTable {
        let k = config::PQ_NUM_CENTROIDS;
        let mut table = vec![0.0f32; self.num_subspaces * k];

        // Cosine ranks by dot product against the normalized query; rescoring restores exact order.
        let normalized;
        let query = if distance == Distance::Cosine {
            normalized = normalize(query);
            &normalized[..]
        } else {
            query
        };

        for sub in 0..self.num_subspaces {
            let q_sub = &query[self.subspace(sub)];
            for ci in 0..k {
                let centroid = self.centroid(sub, ci);
                table[sub * k + ci] = match distance {
                    Distance::Euclid => sq_dist(q_sub, centroid),
                    Distance::Manhattan => q_sub
                        .iter()
                        .zip(centroid)
                        .map(|(a, b)| (a - b).abs())
                        .sum(),
                    Distance::Dot | Distance::Cosine => {
                        -q_sub.iter().zip(centroid).map(|(a, b)| a * b).sum::<f32>()
                    }
                };
            }
        }

        PqDistanceTable {
            table,
            num_subspaces: self.num_subspaces,
        }
    }

    /// Find nearest centroid in a subspace. Returns centroid index (0-255).
    #[inline]
    fn find_nearest_centroid(&self, subspace: usize, sub_vec: &[f32]) -> u8 {
        let mut best_idx = 0u8;
        let mut best_dist = f32::MAX;

        for ci in 0..config::PQ_NUM_CENTROIDS {
            let dist = sq_dist(sub_vec, self.centroid(subspace, ci));
            if dist < best_dist {
                best_dist = dist;
                best_idx = ci as u8;
            }
        }
        best_idx
    }
}

impl PqDistanceTable {
    /// Approximate distance for an encoded vector (one code per subspace).
    #[inline]
    pub fn distance(&self, codes: &[u8]) -> f32 {
        let k = config::PQ_NUM_CENTROIDS;
        codes
            .iter()
            .take(self.num_subspaces)
            .enumerate()
            .map(|(sub, &code)| self.table[sub * k + code as usize])
            .sum()
    }
}

/// K-means clustering with k-means++ initialization.
/// Returns k × width centroids as a flat Vec<f32>.
fn kmeans(data: &[f32], width: usize, k: usize, rng: &mut StdRng) -> Vec<f32> {
    let n = data.len() / width;
    if n <= k {
        // Fewer points than centroids: each point is its own centroid
        return data[..n * width].to_vec();
    }

    let mut centroids = vec![0.0f32; k * width];

    let first = rng.gen_range(0..n);
    centroids[..width].copy_from_slice(&data[first * width..(first + 1) * width]);

    // Distance from each point to its nearest centroid
    let mut min_dists = vec![f32::MAX; n];

    for ci in 1..k {
        let last_centroid = &centroids[(ci - 1) * width..ci * width];
        let mut total = 0.0f64;
        for i in 0..n {
            let d = sq_dist(&data[i * width..(i + 1) * width], last_centroid);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total += min_dists[i] as f64;
        }

        let chosen = if total < 1e-30 {
            // All points coincide with existing centroids
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumulative = 0.0f64;
            min_dists
                .iter()
                .position(|&d| {
                    cumulative += d as f64;
                    cumulative >= threshold
                })
                .unwrap_or(n - 1)
        };
        centroids[ci * width..(ci + 1) * width]
            .copy_from_slice(&data[chosen * width..(chosen + 1) * width]);
    }

    let mut assignments = vec![0usize; n];
    for _ in 0..config::PQ_KMEANS_ITERATIONS {
        for (i, slot) in assignments.iter_mut().enumerate() {
            let point = &data[i * width..(i + 1) * width];
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for ci in 0..k {
                let d = sq_dist(point, &centroids[ci * width..(ci + 1) * width]);
                if d < best_dist {
                    best_dist = d;
                    best = ci;
                }
            }
            *slot = best;
        }

        let mut sums = vec![0.0f32; k * width];
        let mut counts = vec![0u32; k];
        for (i, &ci) in assignments.iter().enumerate() {
            counts[ci] += 1;
            for (acc, &v) in sums[ci * width..(ci + 1) * width]
                .iter_mut()
                .zip(&data[i * width..(i + 1) * width])
            {
                *acc += v;
            }
        }
        // Empty clusters keep their previous centroid.
        for ci in 0..k {
            if counts[ci] > 0 {
                let inv = 1.0 / counts[ci] as f32;
                for (c, s) in centroids[ci * width..(ci + 1) * width]
                    .iter_mut()
                    .zip(&sums[ci * width..(ci + 1) * width])
                {
                    *c = s * inv;
                }
            }
        }
    }

    centroids
}

/// Squared Euclidean distance between two sub-vectors.
#[inline]
fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-10 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}
