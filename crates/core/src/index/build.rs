//! Graph build jobs and the executors that run them.
//!
//! A build runs outside every segment lock. It snapshots the rows it needs, builds
//! the graph, and publishes only if its [`BuildTicket`] is still current; a config
//! change or a newer build bumps the shared sequence and the result is discarded.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::resolver::EffectiveConfig;
use crate::storage::segment::SpaceIndex;

/// Right to publish one build. Cancelled once the controller issues a newer one.
#[derive(Debug, Clone)]
pub struct BuildTicket {
    seq: u64,
    current: Arc<AtomicU64>,
}

impl BuildTicket {
    pub(crate) fn new(seq: u64, current: Arc<AtomicU64>) -> Self {
        Self { seq, current }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.seq
    }
}

impl PartialEq for BuildTicket {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && Arc::ptr_eq(&self.current, &other.current)
    }
}

impl Eq for BuildTicket {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Ready,
    /// Always [`Error::BuildFailed`] carrying the reason recorded on the controller.
    Failed(Error),
    Cancelled,
}

impl BuildOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BuildOutcome::Ready => "ready",
            BuildOutcome::Failed(_) => "failed",
            BuildOutcome::Cancelled => "cancelled",
        }
    }
}

/// Graph build for one (segment, vector space) pair.
pub struct BuildJob {
    target: Arc<SpaceIndex>,
    config: Arc<EffectiveConfig>,
    ticket: BuildTicket,
}

impl fmt::Debug for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildJob")
            .field("segment", &self.target.segment())
            .field("vector_space", &self.target.name())
            .field("seq", &self.ticket.seq)
            .finish()
    }
}

impl BuildJob {
    pub(crate) fn new(target: Arc<SpaceIndex>, config: Arc<EffectiveConfig>, ticket: BuildTicket) -> Self {
        Self {
            target,
            config,
            ticket,
        }
    }

    pub fn segment(&self) -> u32 {
        self.target.segment()
    }

    pub fn vector_space(&self) -> &str {
        self.target.name()
    }

    pub fn ticket(&self) -> &BuildTicket {
        &self.ticket
    }

    /// Build and publish. Panics inside the build are reported as failures.
    pub fn run(self) -> BuildOutcome {
        if self.ticket.is_cancelled() {
            return self.finish(BuildOutcome::Cancelled);
        }
        let started = std::time::Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.target.build_graph(&self.config, &self.ticket)
        }));
        let outcome = match result {
            Ok(Ok(())) => BuildOutcome::Ready,
            Ok(Err(Error::StaleConfigRace(_))) => BuildOutcome::Cancelled,
            Ok(Err(err)) => self.failed(err.to_string()),
            Err(panic) => self.failed(panic_message(panic.as_ref())),
        };
        metrics::histogram!("multivec_index_build_seconds").record(started.elapsed().as_secs_f64());
        self.finish(outcome)
    }

    /// Report a build that could not be started, e.g. no worker available.
    pub fn fail(self, reason: &str) -> BuildOutcome {
        let outcome = self.failed(reason.to_string());
        self.finish(outcome)
    }

    fn failed(&self, reason: String) -> BuildOutcome {
        self.target.fail_build(&self.ticket, &reason);
        BuildOutcome::Failed(Error::BuildFailed(reason))
    }

    fn finish(&self, outcome: BuildOutcome) -> BuildOutcome {
        metrics::counter!("multivec_index_builds_total", "outcome" => outcome.label()).increment(1);
        tracing::info!(
            segment = self.segment(),
            vector_space = %self.vector_space(),
            seq = self.ticket.seq,
            outcome = outcome.label(),
            "index build finished"
        );
        outcome
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("build panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("build panicked: {s}")
    } else {
        "build panicked".to_string()
    }
}

/// Runs build jobs. Implementations decide where and when.
pub trait BuildExecutor: Send + Sync + fmt::Debug {
    fn submit(&self, job: BuildJob);
}

/// Runs every job on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineBuildExecutor;

impl BuildExecutor for InlineBuildExecutor {
    fn submit(&self, job: BuildJob) {
        job.run();
    }
}

/// Queues jobs until the owner drives them.
#[derive(Debug, Default)]
pub struct DeferredBuildExecutor {
    queue: Mutex<VecDeque<BuildJob>>,
}

impl DeferredBuildExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every queued job, including jobs queued while running.
    pub fn run_pending(&self) -> Vec<BuildOutcome> {
        let mut outcomes = Vec::new();
        loop {
            // Pop under the lock, run without it: a build may enqueue follow-ups.
            let next = self.queue.lock().pop_front();
            match next {
                Some(job) => outcomes.push(job.run()),
                None => return outcomes,
            }
        }
    }

    /// Fail every queued job with `reason`.
    pub fn fail_pending(&self, reason: &str) -> Vec<BuildOutcome> {
        let jobs: Vec<BuildJob> = self.queue.lock().drain(..).collect();
        jobs.into_iter().map(|job| job.fail(reason)).collect()
    }
}

impl BuildExecutor for DeferredBuildExecutor {
    fn submit(&self, job: BuildJob) {
        self.queue.lock().push_back(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_cancellation() {
        let current = Arc::new(AtomicU64::new(1));
        let ticket = BuildTicket::new(1, Arc::clone(&current));
        assert!(!ticket.is_cancelled());
        current.fetch_add(1, Ordering::AcqRel);
        assert!(ticket.is_cancelled());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "build panicked: boom");
    }
}
