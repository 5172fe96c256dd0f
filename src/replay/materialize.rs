//! Download one version into the working tree.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::history::VersionRecord;
use crate::storage::ObjectStore;

/// Fetch the content of `record` and write it to [`VersionRecord::local_path`],
/// creating parent directories and overwriting any existing file.
///
/// Returns the number of bytes written.  Every error is fatal to the
/// changeset being replayed.
#[instrument(skip_all, fields(key = %record.key, version = %record.version_id))]
pub async fn materialize(store: &dyn ObjectStore, record: &VersionRecord) -> Result<u64> {
    let bytes = store
        .get_version(&record.bucket, &record.key, &record.version_id)
        .await
        .with_context(|| {
            format!(
                "couldn't get object {}:{}@{}",
                record.bucket, record.key, record.version_id
            )
        })?;

    let dest = record.local_path();
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("couldn't create directory {}", parent.display()))?;
    }

    tokio::fs::write(&dest, &bytes)
        .await
        .with_context(|| format!("couldn't write file {}", dest.display()))?;

    debug!(path = %dest.display(), bytes = bytes.len(), "version materialized");
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::storage::memory::MemoryStore;

    fn record(root: &Path, key: &str, version: &str) -> VersionRecord {
        VersionRecord {
            key: key.to_string(),
            bucket: "b".to_string(),
            version_id: version.to_string(),
            last_modified: DateTime::<Utc>::from_timestamp(1, 0).unwrap(),
            repository_root: root.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn writes_nested_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("b").put("deep/dir/file.txt", "v1", 1, "hello");

        let rec = record(tmp.path(), "deep/dir/file.txt", "v1");
        let written = materialize(&store, &rec).await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("b/deep/dir/file.txt")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn rematerializing_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("b").put("a.txt", "v1", 1, "same bytes");
        let rec = record(tmp.path(), "a.txt", "v1");

        materialize(&store, &rec).await.unwrap();
        let first = std::fs::read(rec.local_path()).unwrap();
        materialize(&store, &rec).await.unwrap();
        let second = std::fs::read(rec.local_path()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn overwrites_with_older_version() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("b")
            .put("a.txt", "v1", 1, "short")
            .put("a.txt", "v2", 2, "a much longer body");

        materialize(&store, &record(tmp.path(), "a.txt", "v2")).await.unwrap();
        materialize(&store, &record(tmp.path(), "a.txt", "v1")).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("b/a.txt")).unwrap(),
            "short"
        );
    }

    #[tokio::test]
    async fn fetch_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new("b")
            .put("a.txt", "v1", 1, "x")
            .fail_fetch_of("a.txt", "v1");
        let rec = record(tmp.path(), "a.txt", "v1");

        let err = materialize(&store, &rec).await.unwrap_err();
        assert!(format!("{err:#}").contains("couldn't get object b:a.txt@v1"));
        assert!(!rec.local_path().exists());
    }

    #[tokio::test]
    async fn directory_in_the_way_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("b/a.txt")).unwrap();
        let store = MemoryStore::new("b").put("a.txt", "v1", 1, "x");

        let err = materialize(&store, &record(tmp.path(), "a.txt", "v1"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("couldn't write file"));
    }
}
