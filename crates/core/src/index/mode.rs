//! Flat/graph index mode selection for one (segment, vector space) pair.
//!
//! The controller is level-triggered: every insert, delete or reconfiguration
//! reports the current live count, threshold policy and config generation, and the
//! controller derives the state from those inputs. It never touches index data; it
//! tells the caller what to do through a [`Transition`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::index::build::BuildTicket;
use crate::resolver::{ConfigGeneration, IndexingThreshold, ThresholdPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    NotBuilt,
    Building,
    Ready,
    /// The graph no longer matches the config or the point count; it is not served.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum IndexState {
    Flat,
    Graph(BuildStatus),
}

/// Index actually answering searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    Flat,
    Graph,
}

impl IndexState {
    pub fn mode(&self) -> IndexMode {
        match self {
            IndexState::Graph(BuildStatus::Ready) => IndexMode::Graph,
            _ => IndexMode::Flat,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            IndexState::Flat => "flat",
            IndexState::Graph(BuildStatus::NotBuilt) => "not_built",
            IndexState::Graph(BuildStatus::Building) => "building",
            IndexState::Graph(BuildStatus::Ready) => "ready",
            IndexState::Graph(BuildStatus::Stale) => "stale",
        }
    }
}

/// Work the caller must perform after an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Discard the published graph.
    pub drop_graph: bool,
    /// Submit a build carrying this ticket.
    pub start_build: Option<BuildTicket>,
}

/// Operator-facing state of one (segment, vector space) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentIndexState {
    pub segment: u32,
    pub vector_space: String,
    pub state: IndexState,
    pub mode: IndexMode,
    pub point_count: u64,
    pub indexed_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Debug)]
struct ControllerState {
    state: IndexState,
    point_count: u64,
    /// Generation the current build or graph was made for.
    generation: Option<ConfigGeneration>,
    degraded: Option<String>,
    /// A rebuild over compacted rows is running while the ready graph keeps serving.
    compacting: bool,
}

#[derive(Debug)]
pub struct IndexModeController {
    segment: u32,
    space: String,
    inner: RwLock<ControllerState>,
    /// Sequence of the only build allowed to publish; bumping it cancels the others.
    build_seq: Arc<AtomicU64>,
}

impl IndexModeController {
    pub fn new(segment: u32, space: impl Into<String>) -> Self {
        Self {
            segment,
            space: space.into(),
            inner: RwLock::new(ControllerState {
                state: IndexState::Flat,
                point_count: 0,
                generation: None,
                degraded: None,
                compacting: false,
            }),
            build_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Re-derive a controller from the live count alone.
    ///
    /// A segment at or above the threshold comes back as `Graph(NotBuilt)`; the
    /// next observation starts its build.
    pub fn recover(segment: u32, space: impl Into<String>, point_count: u64, policy: ThresholdPolicy) -> Self {
        let controller = Self::new(segment, space);
        {
            let mut inner = controller.inner.write();
            inner.point_count = point_count;
            if let IndexingThreshold::Points(t) = policy.threshold {
                if point_count >= t.max(1) {
                    inner.state = IndexState::Graph(BuildStatus::NotBuilt);
                }
            }
        }
        controller
    }

    pub fn state(&self) -> IndexState {
        self.inner.read().state
    }

    pub fn current_mode(&self) -> IndexMode {
        self.inner.read().state.mode()
    }

    pub fn point_count(&self) -> u64 {
        self.inner.read().point_count
    }

    pub fn degraded(&self) -> Option<String> {
        self.inner.read().degraded.clone()
    }

    pub fn generation(&self) -> Option<ConfigGeneration> {
        self.inner.read().generation
    }

    pub fn snapshot(&self, indexed_count: u64) -> SegmentIndexState {
        let inner = self.inner.read();
        SegmentIndexState {
            segment: self.segment,
            vector_space: self.space.clone(),
            state: inner.state,
            mode: inner.state.mode(),
            point_count: inner.point_count,
            indexed_count,
            degraded: inner.degraded.clone(),
        }
    }

    /// Evaluate the state for the given inputs.
    pub fn observe(
        &self,
        point_count: u64,
        policy: ThresholdPolicy,
        generation: ConfigGeneration,
    ) -> Transition {
        let mut inner = self.inner.write();
        inner.point_count = point_count;
        let mut transition = Transition::default();

        let threshold = match policy.threshold {
            IndexingThreshold::Disabled => {
                if let IndexState::Graph(status) = inner.state {
                    if status == BuildStatus::Building || inner.compacting {
                        self.cancel_in_flight();
                    }
                    transition.drop_graph = status == BuildStatus::Ready;
                    inner.generation = None;
                    self.set_state(&mut inner, IndexState::Flat);
                }
                return transition;
            }
            IndexingThreshold::Points(t) => t.max(1),
        };
        let floor = threshold.saturating_sub(policy.margin);

        if let IndexState::Graph(status @ (BuildStatus::Building | BuildStatus::Ready)) = inner.state {
            let outdated = inner.generation != Some(generation);
            if outdated || point_count < floor {
                if status == BuildStatus::Building || inner.compacting {
                    self.cancel_in_flight();
                }
                transition.drop_graph = status == BuildStatus::Ready;
                self.set_state(&mut inner, IndexState::Graph(BuildStatus::Stale));
            }
        }

        let buildable = matches!(
            inner.state,
            IndexState::Flat | IndexState::Graph(BuildStatus::NotBuilt | BuildStatus::Stale)
        );
        if buildable && inner.degraded.is_none() && point_count >= threshold {
            let seq = self.cancel_in_flight();
            inner.generation = Some(generation);
            self.set_state(&mut inner, IndexState::Graph(BuildStatus::Building));
            transition.start_build = Some(BuildTicket::new(seq, Arc::clone(&self.build_seq)));
        } else if inner.state == IndexState::Graph(BuildStatus::NotBuilt) && point_count < threshold {
            self.set_state(&mut inner, IndexState::Flat);
        }

        transition
    }

    /// Record that the effective parameters did not change under a new generation.
    pub fn adopt_generation(&self, generation: ConfigGeneration) {
        let mut inner = self.inner.write();
        if inner.generation.is_some() {
            inner.generation = Some(generation);
        }
    }

    /// Start a rebuild of a ready graph over compacted rows.
    ///
    /// The state stays `Ready` and the current graph keeps serving until the
    /// rebuild publishes. Returns `None` unless the graph is ready and no
    /// rebuild is running yet.
    pub fn begin_compaction(&self) -> Option<BuildTicket> {
        let mut inner = self.inner.write();
        if inner.state != IndexState::Graph(BuildStatus::Ready) || inner.compacting {
            return None;
        }
        inner.compacting = true;
        let seq = self.cancel_in_flight();
        Some(BuildTicket::new(seq, Arc::clone(&self.build_seq)))
    }

    pub fn compacting(&self) -> bool {
        self.inner.read().compacting
    }

    /// Whether a build holding `ticket` may still publish.
    pub fn accepts(&self, ticket: &BuildTicket) -> bool {
        let inner = self.inner.read();
        Self::publishable(&inner) && !ticket.is_cancelled()
    }

    /// Mark the build as published. Returns `false` if the ticket was superseded.
    pub fn complete(&self, ticket: &BuildTicket) -> bool {
        let mut inner = self.inner.write();
        if !Self::publishable(&inner) || ticket.is_cancelled() {
            return false;
        }
        inner.compacting = false;
        self.set_state(&mut inner, IndexState::Graph(BuildStatus::Ready));
        true
    }

    fn publishable(inner: &ControllerState) -> bool {
        match inner.state {
            IndexState::Graph(BuildStatus::Building) => true,
            IndexState::Graph(BuildStatus::Ready) => inner.compacting,
            _ => false,
        }
    }

    /// Fall back to flat scan and record why. No retry happens until [`Self::retry`].
    ///
    /// A failed compaction rebuild only clears its flag; the ready graph stays.
    pub fn fail(&self, ticket: &BuildTicket, reason: impl Into<String>) -> bool {
        let mut inner = self.inner.write();
        if !Self::publishable(&inner) || ticket.is_cancelled() {
            return false;
        }
        if inner.compacting {
            inner.compacting = false;
            tracing::warn!(
                segment = self.segment,
                vector_space = %self.space,
                reason = %reason.into(),
                "index compaction failed, keeping current graph"
            );
            return true;
        }
        self.cancel_in_flight();
        inner.generation = None;
        let reason = reason.into();
        tracing::warn!(
            segment = self.segment,
            vector_space = %self.space,
            reason = %reason,
            "index build failed, serving flat scan"
        );
        inner.degraded = Some(reason);
        self.set_state(&mut inner, IndexState::Flat);
        true
    }

    /// Clear the degraded flag. Returns `true` if the controller was degraded.
    pub fn retry(&self) -> bool {
        self.inner.write().degraded.take().is_some()
    }

    /// Cancel any in-flight build without changing the reported state.
    pub fn cancel(&self) {
        self.cancel_in_flight();
    }

    fn cancel_in_flight(&self) -> u64 {
        self.build_seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn set_state(&self, inner: &mut ControllerState, next: IndexState) {
        if inner.state == next {
            return;
        }
        inner.compacting = false;
        tracing::debug!(
            segment = self.segment,
            vector_space = %self.space,
            from = inner.state.label(),
            to = next.label(),
            point_count = inner.point_count,
            "index state transition"
        );
        metrics::counter!("multivec_mode_transitions_total", "to" => next.label()).increment(1);
        inner.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u64) -> ThresholdPolicy {
        ThresholdPolicy {
            threshold: IndexingThreshold::Points(threshold),
            margin: (threshold as f64 * 0.1).ceil() as u64,
        }
    }

    fn generation(overrides: u64) -> ConfigGeneration {
        ConfigGeneration {
            defaults_version: 0,
            override_version: overrides,
        }
    }

    fn ready(ctrl: &IndexModeController, count: u64, gen: ConfigGeneration) -> BuildTicket {
        let t = ctrl.observe(count, policy(1_000), gen);
        let ticket = t.start_build.expect("build should start");
        assert!(ctrl.complete(&ticket));
        ticket
    }

    #[test]
    fn test_flat_below_threshold() {
        let ctrl = IndexModeController::new(0, "v");
        let t = ctrl.observe(999, policy(1_000), generation(0));
        assert_eq!(t, Transition::default());
        assert_eq!(ctrl.state(), IndexState::Flat);
        assert_eq!(ctrl.current_mode(), IndexMode::Flat);
    }

    #[test]
    fn test_crossing_threshold_starts_build_and_reports_graph_only_when_ready() {
        let ctrl = IndexModeController::new(0, "v");
        let t = ctrl.observe(1_000, policy(1_000), generation(0));
        let ticket = t.start_build.unwrap();
        assert_eq!(ctrl.state(), IndexState::Graph(BuildStatus::Building));
        assert_eq!(ctrl.current_mode(), IndexMode::Flat);
        assert!(ctrl.accepts(&ticket));
        assert!(ctrl.complete(&ticket));
        assert_eq!(ctrl.current_mode(), IndexMode::Graph);
    }

    #[test]
    fn test_hysteresis_margin() {
        let ctrl = IndexModeController::new(0, "v");
        ready(&ctrl, 1_000, generation(0));

        // Within the margin the graph stays.
        let t = ctrl.observe(950, policy(1_000), generation(0));
        assert!(!t.drop_graph);
        assert_eq!(ctrl.current_mode(), IndexMode::Graph);

        // Below threshold - margin it goes stale.
        let t = ctrl.observe(500, policy(1_000), generation(0));
        assert!(t.drop_graph);
        assert_eq!(ctrl.state(), IndexState::Graph(BuildStatus::Stale));
        assert_eq!(ctrl.current_mode(), IndexMode::Flat);

        // Back over the threshold triggers a rebuild.
        let t = ctrl.observe(1_000, policy(1_000), generation(0));
        assert!(t.start_build.is_some());
    }

    #[test]
    fn test_generation_change_marks_stale_and_rebuilds() {
        let ctrl = IndexModeController::new(0, "v");
        let old = ready(&ctrl, 2_000, generation(0));
        let t = ctrl.observe(2_000, policy(1_000), generation(1));
        assert!(t.drop_graph);
        let ticket = t.start_build.unwrap();
        assert!(old.is_cancelled());
        assert_eq!(ctrl.state(), IndexState::Graph(BuildStatus::Building));
        assert_eq!(ctrl.generation(), Some(generation(1)));
        assert!(ctrl.complete(&ticket));
    }

    #[test]
    fn test_superseded_build_cannot_publish() {
        let ctrl = IndexModeController::new(0, "v");
        let first = ctrl.observe(1_000, policy(1_000), generation(0)).start_build.unwrap();
        let second = ctrl.observe(1_000, policy(1_000), generation(1)).start_build.unwrap();
        assert!(first.is_cancelled());
        assert!(!ctrl.complete(&first));
        assert_eq!(ctrl.state(), IndexState::Graph(BuildStatus::Building));
        assert!(ctrl.complete(&second));
    }

    #[test]
    fn test_disabled_threshold_drops_graph() {
        let ctrl = IndexModeController::new(0, "v");
        ready(&ctrl, 1_000, generation(0));
        let disabled = ThresholdPolicy {
            threshold: IndexingThreshold::Disabled,
            margin: 0,
        };
        let t = ctrl.observe(50_000, disabled, generation(1));
        assert!(t.drop_graph);
        assert!(t.start_build.is_none());
        assert_eq!(ctrl.state(), IndexState::Flat);
    }

    #[test]
    fn test_failure_degrades_until_retry() {
        let ctrl = IndexModeController::new(0, "v");
        let ticket = ctrl.observe(1_000, policy(1_000), generation(0)).start_build.unwrap();
        assert!(ctrl.fail(&ticket, "out of memory"));
        assert_eq!(ctrl.state(), IndexState::Flat);
        assert_eq!(ctrl.degraded().as_deref(), Some("out of memory"));

        // No automatic retry.
        assert!(ctrl.observe(1_200, policy(1_000), generation(0)).start_build.is_none());

        assert!(ctrl.retry());
        assert!(ctrl.observe(1_200, policy(1_000), generation(0)).start_build.is_some());
        assert_eq!(ctrl.degraded(), None);
    }

    #[test]
    fn test_recover_from_count() {
        let below = IndexModeController::recover(0, "v", 10, policy(1_000));
        assert_eq!(below.state(), IndexState::Flat);
        let above = IndexModeController::recover(0, "v", 5_000, policy(1_000));
        assert_eq!(above.state(), IndexState::Graph(BuildStatus::NotBuilt));
        assert!(above
            .observe(5_000, policy(1_000), generation(0))
            .start_build
            .is_some());
    }

    #[test]
    fn test_adopt_generation_keeps_ready_graph() {
        let ctrl = IndexModeController::new(0, "v");
        ready(&ctrl, 1_000, generation(0));
        ctrl.adopt_generation(generation(3));
        let t = ctrl.observe(1_000, policy(1_000), generation(3));
        assert_eq!(t, Transition::default());
        assert_eq!(ctrl.current_mode(), IndexMode::Graph);
    }

    #[test]
    fn test_compaction_rebuild_keeps_ready_graph() {
        let ctrl = IndexModeController::new(0, "v");
        ready(&ctrl, 1_000, generation(0));

        let ticket = ctrl.begin_compaction().expect("ready graph compacts");
        assert!(ctrl.begin_compaction().is_none());
        assert!(ctrl.compacting());
        assert!(ctrl.accepts(&ticket));
        assert_eq!(ctrl.current_mode(), IndexMode::Graph);
        assert!(ctrl.complete(&ticket));
        assert!(!ctrl.compacting());
        assert_eq!(ctrl.state(), IndexState::Graph(BuildStatus::Ready));

        // A failed compaction leaves the graph serving and does not degrade.
        let ticket = ctrl.begin_compaction().unwrap();
        assert!(ctrl.fail(&ticket, "disk full"));
        assert_eq!(ctrl.current_mode(), IndexMode::Graph);
        assert_eq!(ctrl.degraded(), None);
        assert!(!ctrl.accepts(&ticket));
    }

    #[test]
    fn test_config_change_cancels_compaction() {
        let ctrl = IndexModeController::new(0, "v");
        ready(&ctrl, 1_000, generation(0));
        let compaction = ctrl.begin_compaction().unwrap();

        let t = ctrl.observe(1_000, policy(1_000), generation(1));
        assert!(t.drop_graph);
        assert!(compaction.is_cancelled());
        assert!(!ctrl.compacting());
        assert!(!ctrl.complete(&compaction));
        assert!(ctrl.complete(&t.start_build.unwrap()));

        // Only ready graphs compact.
        let flat = IndexModeController::new(1, "v");
        assert!(flat.begin_compaction().is_none());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_value(IndexState::Graph(BuildStatus::Ready)).unwrap(),
            serde_json::json!({"kind": "graph", "status": "ready"})
        );
        assert_eq!(
            serde_json::to_value(IndexState::Flat).unwrap(),
            serde_json::json!({"kind": "flat"})
        );
    }
}
