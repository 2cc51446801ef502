//! Request and response data transfer objects for the REST API.
//!
//! Collection-level request bodies (`CreateCollection`, `CollectionUpdate`,
//! `VectorParams`) deserialize straight into the core types. The types here cover the
//! point and search payloads, which accept both the single-vector and the
//! named-vector forms.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use multivec_core::params::DEFAULT_VECTOR_NAME;
use multivec_core::point::{PointId, PointStruct, SearchParams, SearchRequest};

/// Envelope every successful response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub result: T,
    pub status: &'static str,
    /// Seconds spent handling the request.
    pub time: f64,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T, started: Instant) -> Self {
        Self {
            result,
            status: "ok",
            time: started.elapsed().as_secs_f64(),
        }
    }
}

/// Either a bare vector for the unnamed space or a map of named vectors.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VectorInput {
    Single(Vec<f32>),
    Named(HashMap<String, Vec<f32>>),
}

impl VectorInput {
    pub fn into_map(self) -> HashMap<String, Vec<f32>> {
        match self {
            VectorInput::Single(vector) => HashMap::from([(DEFAULT_VECTOR_NAME.to_string(), vector)]),
            VectorInput::Named(vectors) => vectors,
        }
    }
}

/// One point of a `{"points": [...]}` upsert.
#[derive(Debug, Deserialize)]
pub struct PointRequest {
    pub id: PointId,
    pub vector: VectorInput,
    /// Accepted for client compatibility; payloads are not stored.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Column form of an upsert: ids with parallel vector lists.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<PointId>,
    pub vectors: BatchVectors,
    #[serde(default)]
    pub payloads: Option<Vec<Option<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchVectors {
    Single(Vec<Vec<f32>>),
    Named(HashMap<String, Vec<Vec<f32>>>),
}

/// Request body for `PUT /collections/:name/points`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpsertPointsRequest {
    Points { points: Vec<PointRequest> },
    Batch { batch: BatchRequest },
}

impl UpsertPointsRequest {
    /// Flattens either form into core points.
    pub fn into_points(self) -> Result<Vec<PointStruct>, String> {
        match self {
            UpsertPointsRequest::Points { points } => Ok(points
                .into_iter()
                .map(|p| PointStruct {
                    id: p.id,
                    vectors: p.vector.into_map(),
                })
                .collect()),
            UpsertPointsRequest::Batch { batch } => {
                let n = batch.ids.len();
                let columns = match batch.vectors {
                    BatchVectors::Single(rows) => {
                        HashMap::from([(DEFAULT_VECTOR_NAME.to_string(), rows)])
                    }
                    BatchVectors::Named(columns) => columns,
                };
                if let Some((name, rows)) = columns.iter().find(|(_, rows)| rows.len() != n) {
                    return Err(format!(
                        "batch has {n} ids but {} vectors for '{name}'",
                        rows.len()
                    ));
                }
                let mut points: Vec<PointStruct> =
                    batch.ids.into_iter().map(PointStruct::new).collect();
                for (name, rows) in columns {
                    for (point, row) in points.iter_mut().zip(rows) {
                        point.vectors.insert(name.clone(), row);
                    }
                }
                Ok(points)
            }
        }
    }
}

/// Request body for `POST /collections/:name/points/delete`.
#[derive(Debug, Deserialize)]
pub struct DeletePointsRequest {
    pub points: Vec<PointId>,
}

#[derive(Debug, Deserialize)]
pub struct NamedVector {
    pub name: String,
    pub vector: Vec<f32>,
}

/// Query vector: bare for the unnamed space, `{"name", "vector"}` otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryVector {
    Single(Vec<f32>),
    Named(NamedVector),
}

/// Request body for `POST /collections/:name/points/search`.
#[derive(Debug, Deserialize)]
pub struct SearchPointsRequest {
    pub vector: QueryVector,
    pub limit: usize,
    #[serde(default)]
    pub params: Option<SearchParams>,
}

impl From<SearchPointsRequest> for SearchRequest {
    fn from(req: SearchPointsRequest) -> Self {
        let (name, vector) = match req.vector {
            QueryVector::Single(vector) => (DEFAULT_VECTOR_NAME.to_string(), vector),
            QueryVector::Named(named) => (named.name, named.vector),
        };
        SearchRequest::new(name, vector, req.limit).with_params(req.params.unwrap_or_default())
    }
}

/// Request body for `POST /collections/:name/index/retry`.
#[derive(Debug, Default, Deserialize)]
pub struct RetryBuildRequest {
    #[serde(default)]
    pub vector_name: String,
}

#[derive(Debug, Serialize)]
pub struct RetryBuildResponse {
    pub scheduled: usize,
}

#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub operation_id: u64,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CountResult {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CollectionDescription {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionsList {
    pub collections: Vec<CollectionDescription>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub collections_count: usize,
    pub total_points: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_columns_become_points() {
        let req: UpsertPointsRequest = serde_json::from_value(json!({
            "batch": {
                "ids": [1, 2],
                "vectors": {"image": [[1.0, 0.0], [0.0, 1.0]], "text": [[1.0], [2.0]]}
            }
        }))
        .unwrap();
        let points = req.into_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].vectors["image"], vec![0.0, 1.0]);
        assert_eq!(points[1].vectors["text"], vec![2.0]);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let req: UpsertPointsRequest = serde_json::from_value(json!({
            "batch": {"ids": [1, 2], "vectors": [[1.0]]}
        }))
        .unwrap();
        assert!(req.into_points().is_err());
    }

    #[test]
    fn test_points_with_single_and_named_vectors() {
        let req: UpsertPointsRequest = serde_json::from_value(json!({
            "points": [
                {"id": 1, "vector": [1.0, 2.0]},
                {"id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26", "vector": {"a": [1.0]}, "payload": {"k": 1}}
            ]
        }))
        .unwrap();
        let points = req.into_points().unwrap();
        assert_eq!(points[0].vectors[""], vec![1.0, 2.0]);
        assert!(matches!(points[1].id, PointId::Uuid(_)));
    }

    #[test]
    fn test_named_search_vector() {
        let req: SearchPointsRequest = serde_json::from_value(json!({
            "vector": {"name": "image", "vector": [1.0, 0.0]},
            "limit": 3
        }))
        .unwrap();
        let req = SearchRequest::from(req);
        assert_eq!(req.vector_name, "image");
        assert_eq!(req.limit, 3);
    }
}
