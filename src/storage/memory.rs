//! In-memory [`ObjectStore`] used by tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ObjectPage, ObjectStore, StoredVersion, VersionPage};

#[derive(Debug, Clone)]
struct Version {
    id: String,
    last_modified: DateTime<Utc>,
    body: Bytes,
}

/// A single-bucket store.  Keys are listed in lexical order like S3;
/// versions of one key are listed in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    bucket: String,
    objects: BTreeMap<String, Vec<Version>>,
    fail_listing: bool,
    fail_versions: HashSet<String>,
    fail_fetch: HashSet<(String, String)>,
    truncate_objects: bool,
    truncate_versions: HashSet<String>,
    fetches: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Self::default()
        }
    }

    /// Add a version of `key` modified at `secs` since the epoch.
    pub fn put(self, key: &str, version_id: &str, secs: i64, body: &str) -> Self {
        let last_modified = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();
        self.put_at(key, version_id, last_modified, body)
    }

    pub fn put_at(
        mut self,
        key: &str,
        version_id: &str,
        last_modified: DateTime<Utc>,
        body: &str,
    ) -> Self {
        self.objects.entry(key.to_string()).or_default().push(Version {
            id: version_id.to_string(),
            last_modified,
            body: Bytes::from(body.to_string()),
        });
        self
    }

    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Make `list_versions` fail when called with exactly this prefix.
    pub fn fail_versions_of(mut self, key: &str) -> Self {
        self.fail_versions.insert(key.to_string());
        self
    }

    pub fn fail_fetch_of(mut self, key: &str, version_id: &str) -> Self {
        self.fail_fetch
            .insert((key.to_string(), version_id.to_string()));
        self
    }

    pub fn truncate_objects(mut self) -> Self {
        self.truncate_objects = true;
        self
    }

    /// Report the version listing for exactly this prefix as truncated.
    pub fn truncate_versions_of(mut self, key: &str) -> Self {
        self.truncate_versions.insert(key.to_string());
        self
    }

    /// Every `(key, version_id)` fetched so far, in call order.
    pub fn fetches(&self) -> Vec<(String, String)> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn check_bucket(&self, bucket: &str) -> Result<()> {
        if bucket != self.bucket {
            bail!("NoSuchBucket: {bucket}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage> {
        self.check_bucket(bucket)?;
        if self.fail_listing {
            bail!("AccessDenied: ListObjectsV2");
        }
        Ok(ObjectPage {
            keys: self.objects.keys().cloned().collect(),
            truncated: self.truncate_objects,
        })
    }

    async fn list_versions(&self, bucket: &str, prefix: &str) -> Result<VersionPage> {
        self.check_bucket(bucket)?;
        if self.fail_versions.contains(prefix) {
            bail!("AccessDenied: ListObjectVersions {prefix}");
        }
        let versions = self
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(key, versions)| {
                versions.iter().map(move |v| StoredVersion {
                    key: key.clone(),
                    version_id: v.id.clone(),
                    last_modified: v.last_modified,
                })
            })
            .collect();
        Ok(VersionPage {
            versions,
            truncated: self.truncate_versions.contains(prefix),
        })
    }

    async fn get_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<Bytes> {
        self.check_bucket(bucket)?;
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push((key.to_string(), version_id.to_string()));
        }
        if self
            .fail_fetch
            .contains(&(key.to_string(), version_id.to_string()))
        {
            bail!("InternalError: GetObject {key}@{version_id}");
        }
        self.objects
            .get(key)
            .and_then(|versions| versions.iter().find(|v| v.id == version_id))
            .map(|v| v.body.clone())
            .ok_or_else(|| anyhow!("NoSuchVersion: {key}@{version_id}"))
    }
}
