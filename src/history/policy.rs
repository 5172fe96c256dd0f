//! Declared failure policy of each pipeline stage.
//!
//! Version listing isolates per-object failures.  Stages that touch the
//! working tree or the commit log abort the run on the first error.

/// What a stage does when one of its operations fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log, record the failure and carry on with the remaining inputs.
    Isolating,
    /// Abort the whole run.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ObjectListing,
    VersionListing,
    Materialization,
    Replay,
}

impl Stage {
    pub const fn failure_policy(self) -> FailurePolicy {
        match self {
            Stage::VersionListing => FailurePolicy::Isolating,
            Stage::ObjectListing | Stage::Materialization | Stage::Replay => FailurePolicy::Fatal,
        }
    }
}
