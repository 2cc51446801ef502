//! Index selection and background graph builds.

pub mod build;
pub mod flat;
pub mod mode;

pub use build::{
    BuildExecutor, BuildJob, BuildOutcome, BuildTicket, DeferredBuildExecutor, InlineBuildExecutor,
};
pub use mode::{BuildStatus, IndexMode, IndexModeController, IndexState, SegmentIndexState, Transition};
