//! Collection and database data structures.
//!
//! A [`Collection`] owns its defaults, its vector space registry, the resolver
//! deriving effective configs from both, and a fixed set of segments that points
//! are routed to by id. [`Database`] manages named collections with thread-safe
//! concurrent access.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config;
use crate::error::{Error, Result};
use crate::index::build::{BuildExecutor, BuildJob, InlineBuildExecutor};
use crate::index::mode::{BuildStatus, IndexState, SegmentIndexState};
use crate::params::collection::validate_collection_name;
use crate::params::{
    CollectionDefaults, CollectionUpdate, CreateCollection, HnswParams, OptimizersConfig,
    QuantizationParams, VectorParams, VectorsConfig,
};
use crate::point::{PointId, PointStruct, ScoredPoint, SearchRequest};
use crate::registry::{VectorSpaceRegistry, VectorSpaceSchema};
use crate::resolver::{EffectiveConfig, EffectiveConfigResolver, ResolvedSpaces, ResolverDefaults};
use crate::storage::segment::SegmentIndexSet;

/// Physical layout options of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    pub segment_number: usize,
    /// Directory for disk-resident full-precision vectors. System temp dir when `None`.
    pub spill_dir: Option<PathBuf>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            segment_number: config::DEFAULT_SEGMENT_NUMBER,
            spill_dir: None,
        }
    }
}

#[derive(Debug)]
struct CollectionConfig {
    defaults: CollectionDefaults,
    defaults_version: u64,
    registry: VectorSpaceRegistry,
}

#[derive(Debug)]
struct CollectionInner {
    name: String,
    config: RwLock<CollectionConfig>,
    resolver: EffectiveConfigResolver,
    segments: Vec<SegmentIndexSet>,
    executor: Arc<dyn BuildExecutor>,
}

/// Thread-safe handle to a collection.
///
/// Cloning a `Collection` produces a new handle to the same shared data.
#[derive(Debug, Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Every index is built or intentionally flat.
    Green,
    /// Graph builds are pending.
    Yellow,
    /// At least one build failed; affected spaces serve flat scans.
    Red,
}

/// Collection as reported to clients.
///
/// Vector spaces echo their override blocks exactly as declared; collection-level
/// blocks are the configured values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub status: CollectionStatus,
    pub points_count: u64,
    pub vectors_count: u64,
    pub indexed_vectors_count: u64,
    pub segments_count: u64,
    pub config: CollectionConfigInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionConfigInfo {
    pub params: CollectionParamsInfo,
    pub hnsw_config: HnswParams,
    pub optimizer_config: OptimizersConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization_config: Option<QuantizationParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionParamsInfo {
    pub vectors: VectorsConfig,
    pub on_disk_payload: bool,
}

impl Collection {
    /// Creates a new empty collection from a creation request.
    pub fn new(
        name: impl Into<String>,
        request: CreateCollection,
        resolver_defaults: ResolverDefaults,
        options: CollectionOptions,
        executor: Arc<dyn BuildExecutor>,
    ) -> Result<Self> {
        let name = name.into();
        validate_collection_name(&name)?;
        if options.segment_number == 0 || options.segment_number > config::MAX_SEGMENT_NUMBER {
            return Err(Error::InvalidRequest(format!(
                "segment number must be between 1 and {}",
                config::MAX_SEGMENT_NUMBER
            )));
        }

        let defaults = request.defaults(&resolver_defaults.quantization)?;
        let schemas = request.vectors.into_schemas();
        if schemas.is_empty() {
            return Err(Error::InvalidSchema(
                "a collection needs at least one vector space".to_string(),
            ));
        }
        let mut registry = VectorSpaceRegistry::new();
        registry.register_all(schemas)?;

        let resolver = EffectiveConfigResolver::new(resolver_defaults);
        let mut segments = Vec::with_capacity(options.segment_number);
        for id in 0..options.segment_number {
            let segment = SegmentIndexSet::new(id as u32, options.spill_dir.clone());
            for schema in registry.list() {
                let effective = resolver.resolve_cached(&defaults, 0, &registry, schema);
                segment.add_space(schema, effective)?;
            }
            segments.push(segment);
        }

        tracing::info!(
            collection = %name,
            vector_spaces = registry.len(),
            segments = segments.len(),
            "collection created"
        );

        Ok(Self {
            inner: Arc::new(CollectionInner {
                name,
                config: RwLock::new(CollectionConfig {
                    defaults,
                    defaults_version: 0,
                    registry,
                }),
                resolver,
                segments,
                executor,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn segment_for(&self, id: &PointId) -> &SegmentIndexSet {
        let n = self.inner.segments.len() as u64;
        &self.inner.segments[(id.routing_key() % n) as usize]
    }

    fn resolve_all(&self, config: &CollectionConfig) -> ResolvedSpaces {
        let mut resolved = ResolvedSpaces::default();
        for schema in config.registry.list() {
            let effective = self.inner.resolver.resolve_cached(
                &config.defaults,
                config.defaults_version,
                &config.registry,
                schema,
            );
            let policy = self.inner.resolver.policy(&effective);
            resolved.insert(schema.name.clone(), effective, policy);
        }
        resolved
    }

    fn submit(&self, jobs: Vec<BuildJob>) {
        for job in jobs {
            self.inner.executor.submit(job);
        }
    }

    /// Insert or replace points. The whole batch is validated before anything is written.
    ///
    /// Returns the number of points written.
    pub fn upsert_points(&self, points: Vec<PointStruct>) -> Result<usize> {
        if points.len() > config::MAX_BATCH_SIZE {
            return Err(Error::InvalidRequest(format!(
                "batch of {} points exceeds the limit of {}",
                points.len(),
                config::MAX_BATCH_SIZE
            )));
        }
        let config = self.inner.config.read();
        for point in &points {
            validate_point(&config.registry, point)?;
        }
        let resolved = self.resolve_all(&config);

        let mut jobs = Vec::new();
        let result = points.iter().try_for_each(|point| {
            self.segment_for(&point.id)
                .upsert(point.id, &point.vectors, &resolved, &mut jobs)
        });
        drop(config);
        self.submit(jobs);
        result?;

        metrics::counter!("multivec_points_upserted_total").increment(points.len() as u64);
        Ok(points.len())
    }

    /// Delete points by id. Returns how many existed.
    pub fn delete_points(&self, ids: &[PointId]) -> Result<usize> {
        let config = self.inner.config.read();
        let resolved = self.resolve_all(&config);
        let mut jobs = Vec::new();
        let mut deleted = 0;
        let result = ids.iter().try_for_each(|id| {
            if self.segment_for(id).delete(id, &resolved, &mut jobs)? {
                deleted += 1;
            }
            Ok::<_, Error>(())
        });
        drop(config);
        self.submit(jobs);
        result?;
        Ok(deleted)
    }

    /// Number of distinct points.
    pub fn count_points(&self) -> usize {
        self.inner.segments.iter().map(|s| s.point_count()).sum()
    }

    /// Nearest neighbours of `request.vector` in one vector space.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        if request.limit == 0 || request.limit > config::MAX_LIMIT {
            return Err(Error::InvalidRequest(format!(
                "limit must be between 1 and {}",
                config::MAX_LIMIT
            )));
        }
        request.params.validate()?;
        let config = self.inner.config.read();
        let schema = config
            .registry
            .get(&request.vector_name)
            .ok_or_else(|| Error::UnknownVectorSpace(request.vector_name.clone()))?;
        validate_vector(schema, &request.vector)?;
        let effective = self.inner.resolver.resolve_cached(
            &config.defaults,
            config.defaults_version,
            &config.registry,
            schema,
        );

        let mut hits = Vec::new();
        for segment in &self.inner.segments {
            hits.extend(segment.search(
                &schema.name,
                &request.vector,
                request.limit,
                &request.params,
                &effective,
            )?);
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.truncate(request.limit);
        Ok(hits
            .into_iter()
            .map(|(distance, id)| ScoredPoint {
                id,
                score: schema.distance.score(distance),
            })
            .collect())
    }

    /// Reconfigure defaults and per-space overrides.
    ///
    /// Everything is validated before anything changes. Cached effective configs of
    /// affected spaces are dropped, and segments whose effective parameters changed
    /// mark their graphs stale and schedule rebuilds.
    pub fn update(&self, update: CollectionUpdate) -> Result<()> {
        let mut config = self.inner.config.write();

        let defaults_update = update.defaults_update();
        let mut defaults = config.defaults.clone();
        defaults.apply_update(&defaults_update, &self.inner.resolver.defaults().quantization)?;

        let mut registry = config.registry.clone();
        for (name, change) in &update.vectors {
            let schema = registry
                .get(name)
                .ok_or_else(|| Error::UnknownVectorSpace(name.clone()))?;
            let hnsw = change.hnsw_config.unwrap_or(schema.hnsw_overrides);
            let quantization = change
                .quantization_config
                .unwrap_or(schema.quantization_overrides);
            registry.update_overrides(name, hnsw, quantization)?;
        }

        if !defaults_update.is_empty() {
            config.defaults = defaults;
            config.defaults_version += 1;
            self.inner.resolver.invalidate_all();
        }
        config.registry = registry;
        for name in update.vectors.keys() {
            self.inner.resolver.invalidate(name);
        }
        tracing::info!(
            collection = %self.inner.name,
            defaults_version = config.defaults_version,
            vector_spaces = update.vectors.len(),
            "collection reconfigured"
        );

        let resolved = self.resolve_all(&config);
        let mut jobs = Vec::new();
        let result = self
            .inner
            .segments
            .iter()
            .try_for_each(|segment| segment.reconfigure(&resolved, &mut jobs));
        drop(config);
        self.submit(jobs);
        result
    }

    /// Add a vector space to an existing collection. Existing points have no vector in it.
    pub fn extend_schema(&self, name: impl Into<String>, params: VectorParams) -> Result<()> {
        let mut config = self.inner.config.write();
        let schema = params.into_schema(name);
        let mut registry = config.registry.clone();
        registry.register(schema.clone())?;

        let effective =
            self.inner
                .resolver
                .resolve_cached(&config.defaults, config.defaults_version, &registry, &schema);
        let prepared = self
            .inner
            .segments
            .iter()
            .map(|segment| segment.prepare_space(&schema, Arc::clone(&effective)))
            .collect::<Result<Vec<_>>>()?;
        for (segment, space) in self.inner.segments.iter().zip(prepared) {
            segment.attach(space);
        }
        config.registry = registry;
        tracing::info!(collection = %self.inner.name, vector_space = %schema.name, "vector space added");
        Ok(())
    }

    /// Effective configuration currently used for `space`.
    pub fn effective_config(&self, space: &str) -> Result<Arc<EffectiveConfig>> {
        let config = self.inner.config.read();
        let schema = config
            .registry
            .get(space)
            .ok_or_else(|| Error::UnknownVectorSpace(space.to_string()))?;
        Ok(self.inner.resolver.resolve_cached(
            &config.defaults,
            config.defaults_version,
            &config.registry,
            schema,
        ))
    }

    pub fn defaults(&self) -> CollectionDefaults {
        self.inner.config.read().defaults.clone()
    }

    /// Declared vector spaces in declaration order.
    pub fn vector_spaces(&self) -> Vec<VectorSpaceSchema> {
        self.inner.config.read().registry.list().cloned().collect()
    }

    /// Index state of every (segment, vector space) pair.
    pub fn segment_states(&self) -> Vec<SegmentIndexState> {
        self.inner
            .segments
            .iter()
            .flat_map(|segment| segment.states())
            .collect()
    }

    /// Clear the degraded flag of `space` in every segment and re-evaluate.
    ///
    /// Returns how many builds were scheduled.
    pub fn retry_build(&self, space: &str) -> Result<usize> {
        let config = self.inner.config.read();
        if !config.registry.contains(space) {
            return Err(Error::UnknownVectorSpace(space.to_string()));
        }
        let resolved = self.resolve_all(&config);
        let mut jobs = Vec::new();
        for segment in &self.inner.segments {
            jobs.extend(segment.retry(space, &resolved)?);
        }
        drop(config);
        let scheduled = jobs.len();
        self.submit(jobs);
        Ok(scheduled)
    }

    pub fn cancel_builds(&self) {
        for segment in &self.inner.segments {
            segment.cancel_builds();
        }
    }

    pub fn info(&self) -> CollectionInfo {
        let config = self.inner.config.read();
        let states = self.segment_states();
        let status = if states.iter().any(|s| s.degraded.is_some()) {
            CollectionStatus::Red
        } else if states.iter().any(|s| {
            matches!(
                s.state,
                IndexState::Graph(BuildStatus::NotBuilt | BuildStatus::Building | BuildStatus::Stale)
            )
        }) {
            CollectionStatus::Yellow
        } else {
            CollectionStatus::Green
        };

        let segments = &self.inner.segments;
        CollectionInfo {
            status,
            points_count: segments.iter().map(|s| s.point_count() as u64).sum(),
            vectors_count: segments.iter().map(|s| s.vectors_count() as u64).sum(),
            indexed_vectors_count: segments.iter().map(|s| s.indexed_count() as u64).sum(),
            segments_count: segments.len() as u64,
            config: CollectionConfigInfo {
                params: CollectionParamsInfo {
                    vectors: VectorsConfig::from_schemas(config.registry.list()),
                    on_disk_payload: config.defaults.on_disk_payload,
                },
                hnsw_config: config.defaults.hnsw,
                optimizer_config: OptimizersConfig {
                    indexing_threshold: config.defaults.indexing_threshold,
                },
                quantization_config: config.defaults.quantization,
            },
        }
    }
}

fn validate_point(registry: &VectorSpaceRegistry, point: &PointStruct) -> Result<()> {
    if point.vectors.is_empty() {
        return Err(Error::InvalidRequest(format!("point {} has no vectors", point.id)));
    }
    for (name, vector) in &point.vectors {
        let schema = registry
            .get(name)
            .ok_or_else(|| Error::UnknownVectorSpace(name.clone()))?;
        validate_vector(schema, vector)?;
    }
    Ok(())
}

fn validate_vector(schema: &VectorSpaceSchema, vector: &[f32]) -> Result<()> {
    if vector.len() != schema.size as usize {
        return Err(Error::DimensionMismatch {
            space: schema.name.clone(),
            expected: schema.size,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidVector {
            space: schema.name.clone(),
            reason: "contains NaN or infinite values".to_string(),
        });
    }
    Ok(())
}

/// Database holds all collections.
#[derive(Debug, Clone)]
pub struct Database {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    executor: Arc<dyn BuildExecutor>,
    resolver_defaults: ResolverDefaults,
    options: CollectionOptions,
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Arc::new(InlineBuildExecutor))
    }
}

impl Database {
    /// Creates an empty database whose graph builds go to `executor`.
    pub fn new(executor: Arc<dyn BuildExecutor>) -> Self {
        Self::with_options(executor, ResolverDefaults::default(), CollectionOptions::default())
    }

    pub fn with_options(
        executor: Arc<dyn BuildExecutor>,
        resolver_defaults: ResolverDefaults,
        options: CollectionOptions,
    ) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            executor,
            resolver_defaults,
            options,
        }
    }

    /// Creates a new collection. Fails if a collection with the same name already exists.
    pub fn create_collection(&self, name: &str, request: CreateCollection) -> Result<Collection> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(Error::CollectionExists(name.to_string()));
        }
        let collection = Collection::new(
            name,
            request,
            self.resolver_defaults,
            self.options.clone(),
            Arc::clone(&self.executor),
        )?;
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Returns a cloned handle to the named collection, or `None` if not found.
    pub fn get_collection(&self, name: &str) -> Option<Collection> {
        self.collections.read().get(name).cloned()
    }

    pub fn collection(&self, name: &str) -> Result<Collection> {
        self.get_collection(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Deletes a collection by name and cancels its pending builds. Returns `true` if it existed.
    pub fn delete_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name);
        match removed {
            Some(collection) => {
                collection.cancel_builds();
                tracing::info!(collection = %name, "collection deleted");
                true
            }
            None => false,
        }
    }

    /// Returns the names of all collections, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}
