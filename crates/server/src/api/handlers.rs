//! HTTP request handlers and shared application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use multivec_core::index::SegmentIndexState;
use multivec_core::params::{CollectionUpdate, CreateCollection, VectorParams};
use multivec_core::point::{ScoredPoint, SearchRequest};
use multivec_core::storage::{CollectionInfo, CollectionStatus, Database};

use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
    /// Monotonic id echoed in update results.
    pub operation_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(db: Database, prometheus_handle: PrometheusHandle) -> Self {
        Self {
            db,
            prometheus_handle,
            start_time: Instant::now(),
            operation_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_operation(&self) -> UpdateResult {
        UpdateResult {
            operation_id: self.operation_seq.fetch_add(1, Ordering::Relaxed),
            status: "completed",
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let names = state.db.list_collections();
    let mut total_points = 0;
    let mut warnings = Vec::new();
    for name in &names {
        if let Some(collection) = state.db.get_collection(name) {
            let info = collection.info();
            total_points += info.points_count as usize;
            if info.status == CollectionStatus::Red {
                warnings.push(format!("collection '{name}' has failed index builds"));
            }
        }
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if warnings.is_empty() { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            collections_count: names.len(),
            total_points,
            warnings,
        }),
    )
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    metrics::update_collection_metrics(&state.db);
    state.prometheus_handle.render()
}

/// `GET /collections`
pub async fn list_collections(State(state): State<AppState>) -> ApiResult<CollectionsList> {
    let started = Instant::now();
    let collections = state
        .db
        .list_collections()
        .into_iter()
        .map(|name| CollectionDescription { name })
        .collect();
    Ok(Json(ApiResponse::ok(CollectionsList { collections }, started)))
}

/// `PUT /collections/:name`
pub async fn create_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<CreateCollection>, JsonRejection>,
) -> ApiResult<bool> {
    let started = Instant::now();
    let Json(request) = payload?;
    state.db.create_collection(&name, request)?;
    metrics::record_write_operation(&name, "create_collection");
    Ok(Json(ApiResponse::ok(true, started)))
}

/// `GET /collections/:name`
pub async fn get_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CollectionInfo> {
    let started = Instant::now();
    let collection = state.db.collection(&name)?;
    Ok(Json(ApiResponse::ok(collection.info(), started)))
}

/// `PATCH /collections/:name`
pub async fn update_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<CollectionUpdate>, JsonRejection>,
) -> ApiResult<bool> {
    let started = Instant::now();
    let Json(update) = payload?;
    state.db.collection(&name)?.update(update)?;
    metrics::record_write_operation(&name, "update_collection");
    Ok(Json(ApiResponse::ok(true, started)))
}

/// `DELETE /collections/:name`
///
/// Succeeds for a missing collection; `result` tells whether one was removed.
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<bool> {
    let started = Instant::now();
    let removed = state.db.delete_collection(&name);
    if removed {
        metrics::record_write_operation(&name, "delete_collection");
    }
    Ok(Json(ApiResponse::ok(removed, started)))
}

/// `PUT /collections/:name/vectors/:vector_name`
pub async fn create_vector_space(
    State(state): State<AppState>,
    Path((name, vector_name)): Path<(String, String)>,
    payload: Result<Json<VectorParams>, JsonRejection>,
) -> ApiResult<bool> {
    let started = Instant::now();
    let Json(params) = payload?;
    state
        .db
        .collection(&name)?
        .extend_schema(vector_name, params)?;
    metrics::record_write_operation(&name, "create_vector_space");
    Ok(Json(ApiResponse::ok(true, started)))
}

/// `PUT /collections/:name/points`
pub async fn upsert_points(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<UpsertPointsRequest>, JsonRejection>,
) -> ApiResult<UpdateResult> {
    let started = Instant::now();
    let Json(request) = payload?;
    let points = request.into_points().map_err(ApiError::BadRequest)?;
    let collection = state.db.collection(&name)?;
    let written = collection.upsert_points(points)?;
    tracing::debug!(collection = %name, points = written, "points upserted");
    metrics::record_write_operation(&name, "upsert");
    Ok(Json(ApiResponse::ok(state.next_operation(), started)))
}

/// `POST /collections/:name/points/delete`
pub async fn delete_points(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<DeletePointsRequest>, JsonRejection>,
) -> ApiResult<UpdateResult> {
    let started = Instant::now();
    let Json(request) = payload?;
    let deleted = state.db.collection(&name)?.delete_points(&request.points)?;
    tracing::debug!(collection = %name, points = deleted, "points deleted");
    metrics::record_write_operation(&name, "delete");
    Ok(Json(ApiResponse::ok(state.next_operation(), started)))
}

/// `POST /collections/:name/points/count`
pub async fn count_points(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CountResult> {
    let started = Instant::now();
    let count = state.db.collection(&name)?.count_points();
    Ok(Json(ApiResponse::ok(CountResult { count }, started)))
}

/// `POST /collections/:name/points/search`
pub async fn search_points(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<SearchPointsRequest>, JsonRejection>,
) -> ApiResult<Vec<ScoredPoint>> {
    let started = Instant::now();
    let Json(request) = payload?;
    let request = SearchRequest::from(request);
    let hits = state.db.collection(&name)?.search(&request)?;
    metrics::record_search_operation(&name, &request.vector_name);
    Ok(Json(ApiResponse::ok(hits, started)))
}

/// `GET /collections/:name/index`
pub async fn index_states(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<SegmentIndexState>> {
    let started = Instant::now();
    let states = state.db.collection(&name)?.segment_states();
    Ok(Json(ApiResponse::ok(states, started)))
}

/// `POST /collections/:name/index/retry`
pub async fn retry_build(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<RetryBuildRequest>, JsonRejection>,
) -> ApiResult<RetryBuildResponse> {
    let started = Instant::now();
    let Json(request) = payload?;
    let scheduled = state
        .db
        .collection(&name)?
        .retry_build(&request.vector_name)?;
    tracing::info!(collection = %name, vector_space = %request.vector_name, scheduled, "index build retried");
    Ok(Json(ApiResponse::ok(RetryBuildResponse { scheduled }, started)))
}
