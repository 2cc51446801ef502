//! Scalar quantization implementation.
//!
//! Each f32 vector is compressed to u8 by choosing a clipping range, then linearly
//! mapping each component to \[0, 255\]. With `quantile = 1.0` the range is the
//! vector's min and max; smaller quantiles clip the outermost values so the
//! remaining range gets more resolution. The `min` and `scale` parameters are stored
//! per vector for dequantization.
//!
//! Distance functions use chunked loops with f32 inner accumulators and f64 outer
//! accumulation to minimize rounding error.

use serde::{Deserialize, Serialize};

/// Scalar-quantized vector: f32 → u8 with the clipping range for reconstruction.
/// `scale` is precomputed as (max - min) / 255.0 to avoid redundant division in hot paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedVector {
    pub data: Vec<u8>,
    pub min: f32,
    pub max: f32,
    pub scale: f32,
}

/// Lightweight reference to quantized vector data. Zero allocation.
#[derive(Debug, Clone, Copy)]
pub struct VectorRef<'a> {
    pub data: &'a [u8],
    pub min: f32,
    pub scale: f32,
}

impl QuantizedVector {
    /// Quantize a f32 vector to u8, clipping to the central `quantile` share of its values.
    pub fn quantize(vector: &[f32], quantile: f32) -> Self {
        if vector.is_empty() {
            return Self {
                data: Vec::new(),
                min: 0.0,
                max: 0.0,
                scale: 0.0,
            };
        }

        let (min, max) = clip_range(vector, quantile);

        let range = max - min;
        let (data, scale) = if range < f32::EPSILON {
            (vec![128u8; vector.len()], 0.0)
        } else {
            let inv_scale = 255.0 / range;
            let data = vector
                .iter()
                .map(|&v| ((v.clamp(min, max) - min) * inv_scale).round().clamp(0.0, 255.0) as u8)
                .collect();
            (data, range / 255.0)
        };

        Self {
            data,
            min,
            max,
            scale,
        }
    }

    /// Dequantize back to f32. Lossy.
    pub fn dequantize(&self) -> Vec<f32> {
        self.as_ref().dequantize()
    }

    /// Create a VectorRef borrowing this vector's data.
    pub fn as_ref(&self) -> VectorRef<'_> {
        VectorRef {
            data: &self.data,
            min: self.min,
            scale: self.scale,
        }
    }
}

impl VectorRef<'_> {
    pub fn dequantize(&self) -> Vec<f32> {
        if self.scale == 0.0 {
            return vec![self.min; self.data.len()];
        }
        self.data
            .iter()
            .map(|&v| self.min + (v as f32) * self.scale)
            .collect()
    }
}

/// Lower and upper clipping bounds keeping the central `quantile` share of values.
fn clip_range(vector: &[f32], quantile: f32) -> (f32, f32) {
    if quantile >= 1.0 {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in vector {
            min = min.min(v);
            max = max.max(v);
        }
        return (min, max);
    }

    let mut sorted = vector.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let last = (sorted.len() - 1) as f32;
    let tail = (1.0 - quantile.max(0.0)) / 2.0;
    let lo = (tail * last).floor() as usize;
    let hi = ((1.0 - tail) * last).ceil() as usize;
    (sorted[lo], sorted[hi.min(sorted.len() - 1)])
}

/// Chunk size for f32 asymmetric loops. 8 × f32 = 256 bit.
const CHUNK_F32: usize = 8;

/// Asymmetric cosine similarity with precomputed query norm squared.
/// Avoids recomputing `norm_q` when the same query is used against many stored vectors.
#[allow(clippy::needless_range_loop)]
pub fn cosine_similarity_asym_prenorm(
    query: &[f32],
    stored: VectorRef<'_>,
    query_norm_sq: f32,
) -> f32 {
    debug_assert_eq!(query.len(), stored.data.len());

    if query_norm_sq < 1e-10 {
        return 0.0;
    }

    let len = query.len();
    let s_min = stored.min;
    let s_scale = stored.scale;

    let mut dot = 0.0f64;
    let mut norm_s = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut cd = 0.0f32;
        let mut cns = 0.0f32;
        for j in 0..CHUNK_F32 {
            let q = query[base + j];
            let s = s_min + stored.data[base + j] as f32 * s_scale;
            cd += q * s;
            cns += s * s;
        }
        dot += cd as f64;
        norm_s += cns as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        let q = query[i] as f64;
        let s = s_min as f64 + stored.data[i] as f64 * s_scale as f64;
        dot += q * s;
        norm_s += s * s;
    }

    let denom = (query_norm_sq as f64).sqrt() * norm_s.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Asymmetric squared Euclidean distance: f32 query vs u8 stored.
#[allow(clippy::needless_range_loop)]
pub fn euclidean_distance_sq_asym(query: &[f32], stored: VectorRef<'_>) -> f32 {
    debug_assert_eq!(query.len(), stored.data.len());

    let len = query.len();
    let s_min = stored.min;
    let s_scale = stored.scale;

    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK_F32 {
            let diff = query[base + j] - (s_min + stored.data[base + j] as f32 * s_scale);
            chunk_acc += diff * diff;
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        let diff = query[i] as f64 - (s_min as f64 + stored.data[i] as f64 * s_scale as f64);
        sum += diff * diff;
    }

    sum as f32
}

/// Asymmetric dot product: f32 query vs u8 stored.
#[allow(clippy::needless_range_loop)]
pub fn dot_product_asym(query: &[f32], stored: VectorRef<'_>) -> f32 {
    debug_assert_eq!(query.len(), stored.data.len());

    let len = query.len();
    let s_min = stored.min;
    let s_scale = stored.scale;

    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK_F32 {
            chunk_acc += query[base + j] * (s_min + stored.data[base + j] as f32 * s_scale);
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        sum += query[i] as f64 * (s_min as f64 + stored.data[i] as f64 * s_scale as f64);
    }

    sum as f32
}

/// Asymmetric Manhattan (L1) distance: f32 query vs u8 stored.
#[allow(clippy::needless_range_loop)]
pub fn manhattan_distance_asym(query: &[f32], stored: VectorRef<'_>) -> f32 {
    debug_assert_eq!(query.len(), stored.data.len());

    let len = query.len();
    let s_min = stored.min;
    let s_scale = stored.scale;

    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK_F32;
    for c in 0..full_chunks {
        let base = c * CHUNK_F32;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK_F32 {
            chunk_acc += (query[base + j] - (s_min + stored.data[base + j] as f32 * s_scale)).abs();
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK_F32)..len {
        sum += (query[i] as f64 - (s_min as f64 + stored.data[i] as f64 * s_scale as f64)).abs();
    }

    sum as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_dequantize() {
        let v = vec![0.0, 0.5, 1.0, -1.0, 0.25];
        let q = QuantizedVector::quantize(&v, 1.0);
        assert!(
            q.scale > 0.0,
            "scale should be positive for non-constant vectors"
        );
        let d = q.dequantize();
        for (orig, deq) in v.iter().zip(d.iter()) {
            assert!((orig - deq).abs() < 0.01, "orig={orig}, deq={deq}");
        }
    }

    #[test]
    fn test_constant_vector_has_zero_scale() {
        let q = QuantizedVector::quantize(&[0.3; 6], 1.0);
        assert_eq!(q.scale, 0.0);
        assert_eq!(q.dequantize(), vec![0.3; 6]);
    }

    #[test]
    fn test_quantile_clips_outliers() {
        let mut v: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        v.push(1_000.0);
        let full = QuantizedVector::quantize(&v, 1.0);
        let clipped = QuantizedVector::quantize(&v, 0.9);
        assert_eq!(full.max, 1_000.0);
        assert!(clipped.max < 1.0, "outlier should be clipped, max={}", clipped.max);
        assert!(clipped.scale < full.scale);
        // Values inside the clipped range keep much better precision.
        let deq = clipped.dequantize();
        assert!((deq[50] - 0.5).abs() < 0.01);
        // Values outside saturate at the bound.
        assert_eq!(*clipped.data.last().unwrap(), 255);
    }

    #[test]
    fn test_asym_dot_and_euclid_close_to_exact() {
        let query = vec![0.5, -0.3, 0.8, 0.1, 0.9, -0.2, 0.6, 0.4, 0.7];
        let stored = vec![0.7, 0.2, -0.5, 0.3, 0.1, 0.8, -0.4, 0.6, -0.1];
        let q = QuantizedVector::quantize(&stored, 1.0);

        let exact_dot: f32 = query.iter().zip(&stored).map(|(a, b)| a * b).sum();
        assert!((dot_product_asym(&query, q.as_ref()) - exact_dot).abs() < 0.02);

        let exact_l2: f32 = query.iter().zip(&stored).map(|(a, b)| (a - b) * (a - b)).sum();
        assert!((euclidean_distance_sq_asym(&query, q.as_ref()) - exact_l2).abs() < 0.05);

        let exact_l1: f32 = query.iter().zip(&stored).map(|(a, b)| (a - b).abs()).sum();
        assert!((manhattan_distance_asym(&query, q.as_ref()) - exact_l1).abs() < 0.05);
    }

    #[test]
    fn test_cosine_asym_prenorm_self_similarity() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        let q = QuantizedVector::quantize(&v, 1.0);
        let norm_sq: f32 = v.iter().map(|x| x * x).sum();
        let sim = cosine_similarity_asym_prenorm(&v, q.as_ref(), norm_sq);
        assert!(sim > 0.99, "self-similarity should be ~1.0, got {sim}");
    }
}
