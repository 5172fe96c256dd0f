//! Object storage layer.
//!
//! The replay pipeline only needs three read operations from the bucket:
//! list keys, list versions under a prefix, and fetch one version's bytes.
//! [`ObjectStore`] captures exactly that so the pipeline can run against S3
//! in production and an in-memory fake in tests.

#[cfg(test)]
pub mod memory;
pub mod s3;

use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use s3::S3Storage;

// ---------------------------------------------------------------------------
// Listing results
// ---------------------------------------------------------------------------

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// The backend has more keys than this page returned.
    pub truncated: bool,
}

/// A stored (non-delete-marker) version as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    pub key: String,
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

/// One page of a version listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPage {
    pub versions: Vec<StoredVersion>,
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-only access to a versioned bucket.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the keys currently present in `bucket`.  Single call, no
    /// pagination.
    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage>;

    /// List retained versions of every key starting with `prefix`.  Single
    /// call, no pagination.
    async fn list_versions(&self, bucket: &str, prefix: &str) -> Result<VersionPage>;

    /// Fetch the content of one specific version.
    async fn get_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<Bytes>;
}
