//! Point identifiers, point payloads for upserts, and search request/result types.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::error::{Error, Result};

/// Point identifier: an unsigned integer or a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(Uuid),
}

impl PointId {
    /// Stable value used to route the point to a segment.
    pub fn routing_key(&self) -> u64 {
        match self {
            PointId::Num(n) => *n,
            PointId::Uuid(u) => {
                let bits = u.as_u128();
                (bits >> 64) as u64 ^ bits as u64
            }
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        PointId::Num(n)
    }
}

impl From<Uuid> for PointId {
    fn from(u: Uuid) -> Self {
        PointId::Uuid(u)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(u) => write!(f, "{u}"),
        }
    }
}

/// A point to upsert: one vector per vector space it has a value in.
#[derive(Debug, Clone, PartialEq)]
pub struct PointStruct {
    pub id: PointId,
    pub vectors: HashMap<String, Vec<f32>>,
}

impl PointStruct {
    pub fn new(id: impl Into<PointId>) -> Self {
        Self {
            id: id.into(),
            vectors: HashMap::new(),
        }
    }

    pub fn with_vector(mut self, space: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(space.into(), vector);
        self
    }
}

/// A search hit. `score` follows the space's metric: similarity for `Cosine` and
/// `Dot` (higher is better), distance for `Euclid` and `Manhattan` (lower is better).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
}

/// How quantized codes take part in a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantizationSearchParams {
    /// Score on full precision only.
    #[serde(default)]
    pub ignore: bool,
    /// Re-score quantized candidates on full precision.
    #[serde(default = "default_rescore")]
    pub rescore: bool,
    /// Candidate multiplier applied before rescoring.
    #[serde(default)]
    pub oversampling: Option<f32>,
}

fn default_rescore() -> bool {
    true
}

impl Default for QuantizationSearchParams {
    fn default() -> Self {
        Self {
            ignore: false,
            rescore: true,
            oversampling: None,
        }
    }
}

impl QuantizationSearchParams {
    pub fn oversampling(&self) -> f32 {
        self.oversampling
            .filter(|o| o.is_finite() && *o >= 1.0)
            .unwrap_or(config::DEFAULT_QUANTIZATION_OVERSAMPLING)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchParams {
    /// Graph search breadth; defaults to `HNSW_DEFAULT_EF_SEARCH`.
    #[serde(default)]
    pub hnsw_ef: Option<usize>,
    /// Flat scan over full-precision vectors.
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub quantization: Option<QuantizationSearchParams>,
}

impl SearchParams {
    /// Reject request knobs outside their documented bounds.
    pub fn validate(&self) -> Result<()> {
        if let Some(ef) = self.hnsw_ef {
            if !config::HNSW_EF_SEARCH_RANGE.contains(&ef) {
                return Err(Error::InvalidRequest(format!(
                    "hnsw_ef must be between {} and {}",
                    config::HNSW_EF_SEARCH_RANGE.start(),
                    config::HNSW_EF_SEARCH_RANGE.end()
                )));
            }
        }
        if let Some(oversampling) = self.quantization.and_then(|q| q.oversampling) {
            if !config::QUANTIZATION_OVERSAMPLING_RANGE.contains(&oversampling) {
                return Err(Error::InvalidRequest(format!(
                    "oversampling must be between {} and {}",
                    config::QUANTIZATION_OVERSAMPLING_RANGE.start(),
                    config::QUANTIZATION_OVERSAMPLING_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}

/// Nearest-neighbor query against one vector space.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector_name: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub params: SearchParams,
}

impl SearchRequest {
    pub fn new(vector_name: impl Into<String>, vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector_name: vector_name.into(),
            vector,
            limit,
            params: SearchParams::default(),
        }
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }
}
