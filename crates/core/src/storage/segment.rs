//! Segments and their per-space indexes.
//!
//! A segment holds one [`SpaceIndex`] per vector space: the rows, an optional
//! HNSW graph over them, and the controller deciding which of the two answers
//! queries. Writes to a segment are serialized by its write mutex; searches only
//! take the space's read lock.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config;
use crate::error::{Error, Result};
use crate::hnsw::{Distance, HnswGraph, VectorSource};
use crate::index::build::{BuildJob, BuildTicket};
use crate::index::flat;
use crate::index::mode::{BuildStatus, IndexModeController, IndexState, SegmentIndexState};
use crate::point::{PointId, SearchParams};
use crate::quantization::ProductCodebook;
use crate::registry::VectorSpaceSchema;
use crate::resolver::{EffectiveConfig, ResolvedSpaces, ThresholdPolicy};
use crate::storage::vectors::VectorStorage;

#[derive(Debug)]
struct SpaceData {
    storage: VectorStorage,
    /// Published graph. Node ids equal storage offsets and cover every row.
    graph: Option<HnswGraph>,
    /// Config the storage was last configured with.
    applied: Arc<EffectiveConfig>,
}

/// Rows, graph and controller of one vector space inside one segment.
#[derive(Debug)]
pub struct SpaceIndex {
    segment: u32,
    name: String,
    data: RwLock<SpaceData>,
    controller: IndexModeController,
}

/// Exact distances over a row snapshot taken for a build.
struct SnapshotSource<'a> {
    rows: &'a [f32],
    dim: usize,
    distance: Distance,
}

impl SnapshotSource<'_> {
    fn row(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dim;
        &self.rows[start..start + self.dim]
    }
}

impl VectorSource for SnapshotSource<'_> {
    fn query_scorer<'a>(&'a self, query: &'a [f32]) -> Box<dyn Fn(u32) -> f32 + 'a> {
        Box::new(move |id| self.distance.distance_exact(query, self.row(id)))
    }

    fn node_scorer(&self, id: u32) -> Box<dyn Fn(u32) -> f32 + '_> {
        let node = self.row(id);
        Box::new(move |other| self.distance.distance_exact(node, self.row(other)))
    }
}

type TrainedCodes = (Arc<ProductCodebook>, Vec<u8>, crate::params::CompressionRatio);

impl SpaceIndex {
    pub fn new(
        segment: u32,
        schema: &VectorSpaceSchema,
        config: Arc<EffectiveConfig>,
        spill_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut storage = VectorStorage::new(schema.size as usize, schema.distance, spill_dir);
        storage.configure(config.quantization.as_ref())?;
        Ok(Self {
            segment,
            name: schema.name.clone(),
            data: RwLock::new(SpaceData {
                storage,
                graph: None,
                applied: config,
            }),
            controller: IndexModeController::new(segment, schema.name.clone()),
        })
    }

    pub fn segment(&self) -> u32 {
        self.segment
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller(&self) -> &IndexModeController {
        &self.controller
    }

    pub fn live_count(&self) -> usize {
        self.data.read().storage.live_count()
    }

    /// Stored rows, tombstones included.
    pub fn row_count(&self) -> usize {
        self.data.read().storage.len()
    }

    pub fn live_ids(&self) -> Vec<PointId> {
        self.data.read().storage.live_ids().collect()
    }

    pub fn raw_in_ram(&self) -> bool {
        self.data.read().storage.raw_in_ram()
    }

    /// Nodes served by the published graph, 0 when flat.
    pub fn indexed_count(&self) -> usize {
        let data = self.data.read();
        match (self.controller.state(), data.graph.as_ref()) {
            (IndexState::Graph(BuildStatus::Ready), Some(graph)) => graph.len(),
            _ => 0,
        }
    }

    pub fn upsert(
        self: &Arc<Self>,
        id: PointId,
        vector: &[f32],
        config: &Arc<EffectiveConfig>,
        policy: ThresholdPolicy,
    ) -> Result<Option<BuildJob>> {
        let mut data = self.data.write();
        let SpaceData { storage, graph, .. } = &mut *data;
        let (offset, previous) = storage.upsert(id, vector)?;
        if let Some(graph) = graph.as_mut() {
            if let Some(old) = previous {
                graph.mark_deleted(old);
            }
            graph.insert(offset, &*storage);
        }
        let job = self.observe(&mut data, config, policy);
        Ok(job.or_else(|| self.compact_if_needed(&mut data, config)))
    }

    /// Remove `id`. Returns whether it was present and any build to submit.
    pub fn delete(
        self: &Arc<Self>,
        id: &PointId,
        config: &Arc<EffectiveConfig>,
        policy: ThresholdPolicy,
    ) -> (bool, Option<BuildJob>) {
        let mut data = self.data.write();
        let SpaceData { storage, graph, .. } = &mut *data;
        let Some(offset) = storage.delete(id) else {
            return (false, None);
        };
        if let Some(graph) = graph.as_mut() {
            graph.mark_deleted(offset);
        }
        let job = self.observe(&mut data, config, policy);
        (true, job.or_else(|| self.compact_if_needed(&mut data, config)))
    }

    /// Apply a new effective config to storage and controller.
    pub fn reconfigure(
        self: &Arc<Self>,
        config: &Arc<EffectiveConfig>,
        policy: ThresholdPolicy,
    ) -> Result<Option<BuildJob>> {
        let mut data = self.data.write();
        let unchanged =
            data.applied.hnsw == config.hnsw && data.applied.quantization == config.quantization;
        if unchanged {
            self.controller.adopt_generation(config.generation);
        } else {
            data.storage.configure(config.quantization.as_ref())?;
            tracing::info!(
                segment = self.segment,
                vector_space = %self.name,
                defaults_version = config.generation.defaults_version,
                override_version = config.generation.override_version,
                "vector space reconfigured"
            );
        }
        data.applied = Arc::clone(config);
        Ok(self.observe(&mut data, config, policy))
    }

    /// Clear a degraded flag and re-evaluate.
    pub fn retry(
        self: &Arc<Self>,
        config: &Arc<EffectiveConfig>,
        policy: ThresholdPolicy,
    ) -> Option<BuildJob> {
        let mut data = self.data.write();
        if !self.controller.retry() {
            return None;
        }
        tracing::info!(segment = self.segment, vector_space = %self.name, "index build retry requested");
        self.observe(&mut data, config, policy)
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    fn observe(
        self: &Arc<Self>,
        data: &mut SpaceData,
        config: &Arc<EffectiveConfig>,
        policy: ThresholdPolicy,
    ) -> Option<BuildJob> {
        let count = data.storage.live_count() as u64;
        let transition = self.controller.observe(count, policy, config.generation);
        if transition.drop_graph {
            data.graph = None;
        }
        transition.start_build.map(|ticket| {
            tracing::info!(
                segment = self.segment,
                vector_space = %self.name,
                seq = ticket.seq(),
                point_count = count,
                "index build scheduled"
            );
            BuildJob::new(Arc::clone(self), Arc::clone(config), ticket)
        })
    }

    /// Reclaim tombstoned rows once they dominate the storage.
    ///
    /// Without a graph the rows are compacted in place. A ready graph is rebuilt
    /// over the live rows by a build job, and a running build compacts when it
    /// publishes. A failed compaction leaves the storage as it was.
    fn compact_if_needed(
        self: &Arc<Self>,
        data: &mut SpaceData,
        config: &Arc<EffectiveConfig>,
    ) -> Option<BuildJob> {
        if !data.storage.needs_compaction() {
            return None;
        }
        match self.controller.state() {
            IndexState::Graph(BuildStatus::Building) => None,
            IndexState::Graph(BuildStatus::Ready) => {
                let ticket = self.controller.begin_compaction()?;
                tracing::info!(
                    segment = self.segment,
                    vector_space = %self.name,
                    seq = ticket.seq(),
                    rows = data.storage.len(),
                    live = data.storage.live_count(),
                    "index compaction scheduled"
                );
                Some(BuildJob::new(Arc::clone(self), Arc::clone(config), ticket))
            }
            _ => {
                debug_assert!(data.graph.is_none());
                match data.storage.compact() {
                    Ok(removed) => tracing::debug!(
                        segment = self.segment,
                        vector_space = %self.name,
                        removed,
                        "vector storage compacted"
                    ),
                    Err(err) => tracing::warn!(
                        segment = self.segment,
                        vector_space = %self.name,
                        error = %err,
                        "vector storage compaction failed"
                    ),
                }
                None
            }
        }
    }

    /// Build a graph for `config` and publish it if `ticket` is still current.
    ///
    /// Live rows are snapshotted under the read lock and the graph is built over
    /// them without any lock. Publishing swaps in storage without the rows that
    /// were tombstoned at snapshot time, so graph node ids match the compacted
    /// offsets, and links the rows appended in the meantime.
    pub fn build_graph(&self, config: &EffectiveConfig, ticket: &BuildTicket) -> Result<()> {
        let (rows, tombstones, dim, distance, needs_codebook) = {
            let data = self.data.read();
            if !self.controller.accepts(ticket) {
                return Err(Error::StaleConfigRace(self.name.clone()));
            }
            let storage = &data.storage;
            let (rows, tombstones) = storage.snapshot_live()?;
            (
                rows,
                tombstones,
                storage.dim(),
                storage.distance(),
                storage.needs_codebook(),
            )
        };
        let snapshot = if dim == 0 { 0 } else { rows.len() / dim };
        tracing::info!(
            segment = self.segment,
            vector_space = %self.name,
            rows = snapshot,
            reclaimed = tombstones.len() - snapshot,
            m = config.hnsw.m,
            ef_construct = config.hnsw.ef_construct,
            "index build started"
        );

        let source = SnapshotSource {
            rows: &rows,
            dim,
            distance,
        };
        let mut graph = HnswGraph::new(&config.hnsw);
        for node in 0..snapshot {
            if node % config::BUILD_CANCEL_CHECK_INTERVAL == 0 && ticket.is_cancelled() {
                tracing::info!(segment = self.segment, vector_space = %self.name, "index build cancelled");
                return Err(Error::StaleConfigRace(self.name.clone()));
            }
            graph.insert(node as u32, &source);
        }

        let trained: Option<TrainedCodes> = needs_codebook.and_then(|compression| {
            let codebook = ProductCodebook::train(&rows, dim, compression)?;
            let codes = rows
                .chunks_exact(dim)
                .flat_map(|row| codebook.encode(row))
                .collect();
            Some((Arc::new(codebook), codes, compression))
        });
        drop(rows);

        let mut data = self.data.write();
        if !self.controller.accepts(ticket) {
            return Err(Error::StaleConfigRace(self.name.clone()));
        }
        let mut storage = data.storage.compacted(&tombstones)?;
        if let Some((codebook, codes, compression)) = trained {
            storage.install_product(codebook, codes, compression)?;
        }
        for offset in 0..snapshot as u32 {
            if storage.is_deleted(offset) {
                graph.mark_deleted(offset);
            }
        }
        let caught_up = storage.len() - snapshot;
        for offset in snapshot as u32..storage.len() as u32 {
            if storage.is_deleted(offset) {
                graph.push_isolated(offset);
            } else {
                graph.insert(offset, &storage);
            }
        }
        // Nothing may fail past this point: the swap replaces rows and graph together.
        if !self.controller.complete(ticket) {
            return Err(Error::StaleConfigRace(self.name.clone()));
        }
        data.storage = storage;
        data.graph = Some(graph);
        tracing::debug!(
            segment = self.segment,
            vector_space = %self.name,
            caught_up,
            "index graph published"
        );
        Ok(())
    }

    /// Record a failed build; the space keeps serving flat scans.
    pub fn fail_build(&self, ticket: &BuildTicket, reason: &str) {
        self.controller.fail(ticket, reason);
    }

    /// Top-k `(distance, id)` pairs, closest first.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        params: &SearchParams,
        config: &EffectiveConfig,
    ) -> Result<Vec<(f32, PointId)>> {
        let data = self.data.read();
        let storage = &data.storage;
        let live = storage.live_count();
        if k == 0 || live == 0 {
            return Ok(Vec::new());
        }
        let k = k.min(live);

        let hits = if params.exact {
            storage.exact_scan(query, k)?
        } else {
            let quantization = params.quantization.unwrap_or_default();
            let quantized = if quantization.ignore {
                None
            } else {
                storage.quantized_scorer(query)
            };
            match (quantized, storage.raw_scorer(query)) {
                (Some(scorer), _) => {
                    let fetch = if quantization.rescore {
                        ((k as f32) * quantization.oversampling()).ceil() as usize
                    } else {
                        k
                    };
                    let fetch = fetch.clamp(k, live);
                    let mut hits = self.candidates(&data, &*scorer, fetch, params, config);
                    if quantization.rescore {
                        storage.rescore(query, &mut hits)?;
                        hits.truncate(k);
                    }
                    hits
                }
                (None, Some(scorer)) => self.candidates(&data, &*scorer, k, params, config),
                (None, None) => storage.exact_scan(query, k)?,
            }
        };

        Ok(hits
            .into_iter()
            .map(|(dist, offset)| (dist, storage.point_id(offset)))
            .collect())
    }

    fn candidates(
        &self,
        data: &SpaceData,
        scorer: &dyn Fn(u32) -> f32,
        k: usize,
        params: &SearchParams,
        config: &EffectiveConfig,
    ) -> Vec<(f32, u32)> {
        let storage = &data.storage;
        match (self.controller.state(), data.graph.as_ref()) {
            (IndexState::Graph(BuildStatus::Ready), Some(graph))
                if storage.live_count() >= config.hnsw.full_scan_threshold as usize =>
            {
                let ef = params.hnsw_ef.unwrap_or(config::HNSW_DEFAULT_EF_SEARCH);
                graph.search(scorer, k, ef)
            }
            _ => flat::search(storage.live_offsets(), scorer, k),
        }
    }

    pub fn state_snapshot(&self) -> SegmentIndexState {
        let indexed = self.indexed_count() as u64;
        self.controller.snapshot(indexed)
    }
}

/// One shard of a collection: a [`SpaceIndex`] per vector space.
#[derive(Debug)]
pub struct SegmentIndexSet {
    id: u32,
    write_lock: Mutex<()>,
    spaces: RwLock<Vec<Arc<SpaceIndex>>>,
    spill_dir: Option<PathBuf>,
}

impl SegmentIndexSet {
    pub fn new(id: u32, spill_dir: Option<PathBuf>) -> Self {
        Self {
            id,
            write_lock: Mutex::new(()),
            spaces: RwLock::new(Vec::new()),
            spill_dir,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn space(&self, name: &str) -> Option<Arc<SpaceIndex>> {
        self.spaces.read().iter().find(|s| s.name() == name).cloned()
    }

    fn space_or_err(&self, name: &str) -> Result<Arc<SpaceIndex>> {
        self.space(name)
            .ok_or_else(|| Error::UnknownVectorSpace(name.to_string()))
    }

    pub fn add_space(&self, schema: &VectorSpaceSchema, config: Arc<EffectiveConfig>) -> Result<()> {
        let space = self.prepare_space(schema, config)?;
        self.attach(space);
        Ok(())
    }

    /// Create an index for a new space without making it visible yet.
    pub fn prepare_space(
        &self,
        schema: &VectorSpaceSchema,
        config: Arc<EffectiveConfig>,
    ) -> Result<Arc<SpaceIndex>> {
        SpaceIndex::new(self.id, schema, config, self.spill_dir.clone()).map(Arc::new)
    }

    pub fn attach(&self, space: Arc<SpaceIndex>) {
        let _guard = self.write_lock.lock();
        self.spaces.write().push(space);
    }

    /// Write a point. Spaces the point has no vector for drop their row.
    ///
    /// Builds to submit are pushed to `jobs` even when a later space fails.
    pub fn upsert(
        &self,
        id: PointId,
        vectors: &HashMap<String, Vec<f32>>,
        resolved: &ResolvedSpaces,
        jobs: &mut Vec<BuildJob>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        for space in self.spaces.read().iter() {
            let (config, policy) = resolved_for(resolved, space.name())?;
            let job = match vectors.get(space.name()) {
                Some(vector) => space.upsert(id, vector, config, policy)?,
                None => space.delete(&id, config, policy).1,
            };
            jobs.extend(job);
        }
        Ok(())
    }

    /// Delete a point from every space. Returns whether any space held it.
    pub fn delete(
        &self,
        id: &PointId,
        resolved: &ResolvedSpaces,
        jobs: &mut Vec<BuildJob>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut found = false;
        for space in self.spaces.read().iter() {
            let (config, policy) = resolved_for(resolved, space.name())?;
            let (removed, job) = space.delete(id, config, policy);
            found |= removed;
            jobs.extend(job);
        }
        Ok(found)
    }

    pub fn reconfigure(&self, resolved: &ResolvedSpaces, jobs: &mut Vec<BuildJob>) -> Result<()> {
        let _guard = self.write_lock.lock();
        for space in self.spaces.read().iter() {
            let (config, policy) = resolved_for(resolved, space.name())?;
            jobs.extend(space.reconfigure(config, policy)?);
        }
        Ok(())
    }

    pub fn retry(&self, name: &str, resolved: &ResolvedSpaces) -> Result<Option<BuildJob>> {
        let _guard = self.write_lock.lock();
        let space = self.space_or_err(name)?;
        let (config, policy) = resolved_for(resolved, name)?;
        Ok(space.retry(config, policy))
    }

    pub fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
        params: &SearchParams,
        config: &EffectiveConfig,
    ) -> Result<Vec<(f32, PointId)>> {
        self.space_or_err(name)?.search(query, k, params, config)
    }

    pub fn states(&self) -> Vec<SegmentIndexState> {
        self.spaces.read().iter().map(|s| s.state_snapshot()).collect()
    }

    /// Distinct points stored in this segment across all spaces.
    pub fn point_count(&self) -> usize {
        let spaces = self.spaces.read();
        if spaces.len() == 1 {
            return spaces[0].live_count();
        }
        spaces
            .iter()
            .flat_map(|s| s.live_ids())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn vectors_count(&self) -> usize {
        self.spaces.read().iter().map(|s| s.live_count()).sum()
    }

    pub fn indexed_count(&self) -> usize {
        self.spaces.read().iter().map(|s| s.indexed_count()).sum()
    }

    pub fn cancel_builds(&self) {
        for space in self.spaces.read().iter() {
            space.cancel();
        }
    }
}

fn resolved_for<'a>(
    resolved: &'a ResolvedSpaces,
    name: &str,
) -> Result<(&'a Arc<EffectiveConfig>, ThresholdPolicy)> {
    match (resolved.get(name), resolved.policy(name)) {
        (Some(config), Some(policy)) => Ok((config, policy)),
        _ => Err(Error::UnknownVectorSpace(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::mode::IndexMode;
    use crate::params::HnswParams;
    use crate::resolver::{ConfigGeneration, IndexingThreshold};

    fn config(threshold: u64, generation: u64) -> Arc<EffectiveConfig> {
        Arc::new(EffectiveConfig {
            hnsw: HnswParams {
                full_scan_threshold: 1,
                ..HnswParams::default()
            },
            quantization: None,
            indexing_threshold: IndexingThreshold::Points(threshold),
            generation: ConfigGeneration {
                defaults_version: generation,
                override_version: 0,
            },
        })
    }

    fn policy(threshold: u64) -> ThresholdPolicy {
        ThresholdPolicy {
            threshold: IndexingThreshold::Points(threshold),
            margin: (threshold as f64 * 0.1).ceil() as u64,
        }
    }

    fn space(config: &Arc<EffectiveConfig>) -> Arc<SpaceIndex> {
        let schema = VectorSpaceSchema::new("v", 4, Distance::Euclid);
        Arc::new(SpaceIndex::new(0, &schema, Arc::clone(config), None).unwrap())
    }

    fn vector(i: u64) -> Vec<f32> {
        vec![i as f32, (i % 7) as f32, (i % 3) as f32, 1.0]
    }

    #[test]
    fn test_build_publishes_and_catches_up() {
        let cfg = config(50, 0);
        let space = space(&cfg);
        let mut job = None;
        for i in 0..50u64 {
            job = job.or(space.upsert(PointId::Num(i), &vector(i), &cfg, policy(50)).unwrap());
        }
        let job = job.expect("threshold reached");
        assert_eq!(space.controller().state(), IndexState::Graph(BuildStatus::Building));

        // Writes after scheduling keep the pending build.
        for i in 50..60u64 {
            assert!(space.upsert(PointId::Num(i), &vector(i), &cfg, policy(50)).unwrap().is_none());
        }
        space.delete(&PointId::Num(3), &cfg, policy(50));

        assert_eq!(job.run(), crate::index::BuildOutcome::Ready);
        assert_eq!(space.controller().current_mode(), IndexMode::Graph);
        assert_eq!(space.indexed_count(), 59);

        let hits = space
            .search(&vector(42), 1, &SearchParams::default(), &cfg)
            .unwrap();
        assert_eq!(hits[0].1, PointId::Num(42));
    }

    #[test]
    fn test_superseded_build_is_cancelled() {
        let cfg = config(10, 0);
        let space = space(&cfg);
        let mut first = None;
        for i in 0..10u64 {
            first = first.or(space.upsert(PointId::Num(i), &vector(i), &cfg, policy(10)).unwrap());
        }
        let newer = config(10, 1);
        let second = space.reconfigure(&newer, policy(10)).unwrap();
        // Effective params are equal, so the pending build keeps its generation.
        assert!(second.is_none());
        let first = first.unwrap();
        assert_eq!(first.run(), crate::index::BuildOutcome::Ready);

        let changed = Arc::new(EffectiveConfig {
            hnsw: HnswParams {
                m: 32,
                ..newer.hnsw
            },
            ..(*config(10, 2)).clone()
        });
        let rebuild = space.reconfigure(&changed, policy(10)).unwrap().unwrap();
        assert_eq!(space.controller().current_mode(), IndexMode::Flat);
        let latest = space.reconfigure(&config(10, 3), policy(10)).unwrap().unwrap();
        assert_eq!(rebuild.run(), crate::index::BuildOutcome::Cancelled);
        assert_eq!(latest.run(), crate::index::BuildOutcome::Ready);
    }

    #[test]
    fn test_flat_space_compacts_repeated_upserts() {
        let cfg = config(1_000_000, 0);
        let space = space(&cfg);
        for round in 0..10_000u64 {
            let job = space
                .upsert(PointId::Num(1), &vector(round), &cfg, policy(1_000_000))
                .unwrap();
            assert!(job.is_none());
        }
        assert_eq!(space.live_count(), 1);
        assert!(space.row_count() < config::COMPACTION_MIN_ROWS);

        let hits = space
            .search(&vector(9_999), 1, &SearchParams::default(), &cfg)
            .unwrap();
        assert_eq!(hits, vec![(0.0, PointId::Num(1))]);
    }

    #[test]
    fn test_ready_graph_is_rebuilt_over_live_rows() {
        let cfg = config(50, 0);
        let space = space(&cfg);
        let mut jobs = Vec::new();
        for i in 0..50u64 {
            jobs.extend(space.upsert(PointId::Num(i), &vector(i), &cfg, policy(50)).unwrap());
        }
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.pop().unwrap().run(), crate::index::BuildOutcome::Ready);

        for _ in 0..6 {
            for i in 0..50u64 {
                jobs.extend(space.upsert(PointId::Num(i), &vector(i), &cfg, policy(50)).unwrap());
            }
        }
        // One rebuild is scheduled; the old graph keeps serving meanwhile.
        assert_eq!(jobs.len(), 1);
        assert!(space.controller().compacting());
        assert_eq!(space.controller().current_mode(), IndexMode::Graph);
        assert_eq!(space.row_count(), 350);

        assert_eq!(jobs.pop().unwrap().run(), crate::index::BuildOutcome::Ready);
        assert!(!space.controller().compacting());
        assert_eq!(space.row_count(), 50);
        assert_eq!(space.live_count(), 50);
        assert_eq!(space.indexed_count(), 50);
        let hits = space
            .search(&vector(17), 1, &SearchParams::default(), &cfg)
            .unwrap();
        assert_eq!(hits[0], (0.0, PointId::Num(17)));
    }

    #[test]
    fn test_exact_search_matches_flat() {
        let cfg = config(1_000, 0);
        let space = space(&cfg);
        for i in 0..20u64 {
            space.upsert(PointId::Num(i), &vector(i), &cfg, policy(1_000)).unwrap();
        }
        let exact = SearchParams {
            exact: true,
            ..SearchParams::default()
        };
        let a = space.search(&vector(5), 3, &exact, &cfg).unwrap();
        let b = space.search(&vector(5), 3, &SearchParams::default(), &cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], (0.0, PointId::Num(5)));
    }

    #[test]
    fn test_segment_upsert_without_vector_removes_row() {
        let segment = SegmentIndexSet::new(0, None);
        let cfg = config(1_000, 0);
        segment
            .add_space(&VectorSpaceSchema::new("a", 4, Distance::Dot), Arc::clone(&cfg))
            .unwrap();
        segment
            .add_space(&VectorSpaceSchema::new("b", 4, Distance::Dot), Arc::clone(&cfg))
            .unwrap();
        let mut resolved = ResolvedSpaces::default();
        resolved.insert("a".into(), Arc::clone(&cfg), policy(1_000));
        resolved.insert("b".into(), Arc::clone(&cfg), policy(1_000));

        let both: HashMap<String, Vec<f32>> =
            [("a".to_string(), vector(1)), ("b".to_string(), vector(2))].into();
        let mut jobs = Vec::new();
        segment.upsert(PointId::Num(1), &both, &resolved, &mut jobs).unwrap();
        assert_eq!(segment.vectors_count(), 2);

        let only_a: HashMap<String, Vec<f32>> = [("a".to_string(), vector(1))].into();
        segment.upsert(PointId::Num(1), &only_a, &resolved, &mut jobs).unwrap();
        assert_eq!(segment.vectors_count(), 1);
        assert_eq!(segment.point_count(), 1);

        assert!(segment.delete(&PointId::Num(1), &resolved, &mut jobs).unwrap());
        assert!(jobs.is_empty());
        assert_eq!(segment.point_count(), 0);
    }
}
