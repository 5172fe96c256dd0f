//! Value types flowing through the replay pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// A live object in the bucket, as returned by the object listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub key: String,
    pub bucket: String,
}

/// One stored revision of one object.
///
/// `repository_root` travels with every record so the materializer can
/// compute a destination without any other context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub key: String,
    pub bucket: String,
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    pub repository_root: PathBuf,
}

impl VersionRecord {
    /// Absolute destination on disk: `{repository_root}/{bucket}/{key}`.
    pub fn local_path(&self) -> PathBuf {
        self.repository_root.join(&self.bucket).join(&self.key)
    }

    /// Path relative to the working tree root, used for staging.
    pub fn repo_relative_path(&self) -> &Path {
        Path::new(&self.key)
    }
}

/// A run of consecutive records replayed as one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub timestamp: DateTime<Utc>,
    pub members: Vec<VersionRecord>,
}

impl Changeset {
    /// Timestamp used for the commit: the last member's modification time.
    ///
    /// Returns `None` only for an empty changeset, which the grouper never
    /// produces.
    pub fn commit_time(&self) -> Option<DateTime<Utc>> {
        self.members.last().map(|m| m.last_modified)
    }
}
