//! Replay the version history of an S3 bucket as a git commit log.
//!
//! Every stored version of every object is collected, ordered by
//! modification time and grouped into changesets; each changeset becomes one
//! commit whose author date is the original modification time.

pub mod config;
pub mod git;
pub mod history;
pub mod metrics;
pub mod replay;
pub mod storage;
