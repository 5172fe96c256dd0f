//! Git command wrappers and working-tree repository management.
//!
//! All operations shell out to the `git` binary using `tokio::process::Command`.
//! Commits are created with plumbing (`write-tree`, `commit-tree`,
//! `update-ref`) so author and committer dates can be set explicitly.

pub mod commands;
pub mod repo;

pub use commands::{LogEntry, Signature};
pub use repo::{GitRepo, PendingCommit};
