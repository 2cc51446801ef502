//! Distance metric implementations.
//!
//! Supports four distance functions: cosine, euclidean (L2), dot product, and
//! manhattan (L1). Each metric has an exact f32-vs-f32 variant and an asymmetric
//! f32-query-vs-u8-stored variant used over scalar-quantized storage.
//!
//! Internally every metric is expressed as a distance where **lower is better**.
//! [`Distance::score`] converts back to the user-facing score.

use serde::{Deserialize, Serialize};

use crate::quantization::{scalar, VectorRef};

/// Distance function of a vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    /// Cosine similarity. Internal distance: `1 - cos`. Score: `cos` (higher is better).
    Cosine,
    /// Euclidean distance. Internal distance: L2². Score: L2 (lower is better).
    Euclid,
    /// Dot product. Internal distance: `-dot`. Score: `dot` (higher is better).
    Dot,
    /// Manhattan distance. Internal distance and score: L1 (lower is better).
    Manhattan,
}

impl Distance {
    /// Exact f32-vs-f32 distance. No quantization loss.
    pub fn distance_exact(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Distance::Cosine => 1.0 - cosine_f32(a, b),
            Distance::Euclid => euclidean_sq_f32(a, b),
            Distance::Dot => -dot_product_f32(a, b),
            Distance::Manhattan => manhattan_f32(a, b),
        }
    }

    /// Asymmetric distance with precomputed query norm squared: f32 query vs u8 stored.
    ///
    /// Only cosine uses `query_norm_sq`; the other metrics ignore it.
    pub fn distance_asym_prenorm(
        &self,
        query: &[f32],
        stored: VectorRef<'_>,
        query_norm_sq: f32,
    ) -> f32 {
        match self {
            Distance::Cosine => {
                1.0 - scalar::cosine_similarity_asym_prenorm(query, stored, query_norm_sq)
            }
            Distance::Euclid => scalar::euclidean_distance_sq_asym(query, stored),
            Distance::Dot => -scalar::dot_product_asym(query, stored),
            Distance::Manhattan => scalar::manhattan_distance_asym(query, stored),
        }
    }

    /// Convert an internal distance to the score reported to callers.
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            Distance::Cosine => 1.0 - distance,
            Distance::Euclid => distance.max(0.0).sqrt(),
            Distance::Dot => -distance,
            Distance::Manhattan => distance,
        }
    }
}

/// Squared L2 norm of a vector.
#[inline]
pub fn norm_sq(v: &[f32]) -> f32 {
    v.iter().map(|&x| x * x).sum()
}

/// Chunk size for f32 loops. 8 × f32 = 256 bit.
const CHUNK: usize = 8;

/// Cosine similarity between two f32 slices. Returns value in [-1, 1].
#[allow(clippy::needless_range_loop)]
pub fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    let full_chunks = a.len() / CHUNK;
    for c in 0..full_chunks {
        let base = c * CHUNK;
        let (mut cd, mut cna, mut cnb) = (0.0f32, 0.0f32, 0.0f32);
        for j in 0..CHUNK {
            let x = a[base + j];
            let y = b[base + j];
            cd += x * y;
            cna += x * x;
            cnb += y * y;
        }
        dot += cd as f64;
        norm_a += cna as f64;
        norm_b += cnb as f64;
    }
    for i in (full_chunks * CHUNK)..a.len() {
        let x = a[i] as f64;
        let y = b[i] as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Squared Euclidean distance between two f32 slices.
#[allow(clippy::needless_range_loop)]
pub fn euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f64;
    let full_chunks = a.len() / CHUNK;
    for c in 0..full_chunks {
        let base = c * CHUNK;
        let mut acc = 0.0f32;
        for j in 0..CHUNK {
            let d = a[base + j] - b[base + j];
            acc += d * d;
        }
        sum += acc as f64;
    }
    for i in (full_chunks * CHUNK)..a.len() {
        let d = (a[i] - b[i]) as f64;
        sum += d * d;
    }
    sum as f32
}

/// Dot product between two f32 slices.
#[allow(clippy::needless_range_loop)]
pub fn dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f64;
    let full_chunks = a.len() / CHUNK;
    for c in 0..full_chunks {
        let base = c * CHUNK;
        let mut acc = 0.0f32;
        for j in 0..CHUNK {
            acc += a[base + j] * b[base + j];
        }
        sum += acc as f64;
    }
    for i in (full_chunks * CHUNK)..a.len() {
        sum += (a[i] * b[i]) as f64;
    }
    sum as f32
}

/// Manhattan (L1) distance between two f32 slices.
pub fn manhattan_f32(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.chunks(CHUNK)
        .zip(b.chunks(CHUNK))
        .map(|(ca, cb)| ca.iter().zip(cb).map(|(x, y)| (x - y).abs()).sum::<f32>() as f64)
        .sum::<f64>() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::QuantizedVector;

    #[test]
    fn test_distance_exact_cosine_orthogonal() {
        let d = Distance::Cosine.distance_exact(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((d - 1.0).abs() < 0.001, "orthogonal cosine distance = 1.0, got {d}");
    }

    #[test]
    fn test_distance_exact_euclid() {
        let d = Distance::Euclid.distance_exact(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]);
        assert!((d - 25.0).abs() < 0.001, "squared euclidean should be 25, got {d}");
        assert!((Distance::Euclid.score(d) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_distance_exact_dot() {
        let d = Distance::Dot.distance_exact(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((d - (-32.0)).abs() < 0.001, "negative dot product should be -32, got {d}");
        assert!((Distance::Dot.score(d) - 32.0).abs() < 0.001);
    }

    #[test]
    fn test_distance_exact_manhattan_long_vector() {
        let a = vec![1.0f32; 19];
        let b = vec![-1.0f32; 19];
        assert!((Distance::Manhattan.distance_exact(&a, &b) - 38.0).abs() < 1e-4);
    }

    #[test]
    fn test_asym_accuracy_vs_exact() {
        let query = vec![0.5, -0.3, 0.8, 0.1, 0.9, -0.2, 0.6, 0.4];
        let stored_raw = vec![0.7, 0.2, -0.5, 0.3, 0.1, 0.8, -0.4, 0.6];
        let qs = QuantizedVector::quantize(&stored_raw, 1.0);
        for metric in [Distance::Cosine, Distance::Euclid, Distance::Dot, Distance::Manhattan] {
            let exact = metric.distance_exact(&query, &stored_raw);
            let asym = metric.distance_asym_prenorm(&query, qs.as_ref(), norm_sq(&query));
            assert!(
                (exact - asym).abs() < 0.1,
                "{metric:?} asym vs exact gap too large: exact={exact}, asym={asym}"
            );
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&[Distance::Cosine, Distance::Euclid, Distance::Dot])
            .unwrap();
        assert_eq!(json, r#"["Cosine","Euclid","Dot"]"#);
        let parsed: Distance = serde_json::from_str(r#""Manhattan""#).unwrap();
        assert_eq!(parsed, Distance::Manhattan);
    }
}
