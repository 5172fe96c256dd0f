//! Changeset replay into the working tree.
//!
//! [`materialize`] downloads one version to disk, [`replayer`] turns each
//! changeset into a commit, and [`pipeline`] wires the whole run together.

pub mod materialize;
pub mod pipeline;
pub mod replayer;

pub use pipeline::{run, run_recorded, RunSummary};
