//! Object and version enumeration.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use chrono::SubsecRound;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::model::{ObjectRef, VersionRecord};
use super::policy::{FailurePolicy, Stage};
use crate::metrics::Metrics;
use crate::storage::ObjectStore;

// ---------------------------------------------------------------------------
// Key matching
// ---------------------------------------------------------------------------

/// How versions returned by a prefix query are attributed to an object.
///
/// S3 only offers prefix queries for versions, so listing key `a` also
/// returns the versions of `a2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyMatch {
    /// Keep only versions whose key equals the listed object's key.
    #[default]
    Exact,
    /// Keep everything the prefix query returned.
    Prefix,
}

impl KeyMatch {
    fn accepts(self, object_key: &str, version_key: &str) -> bool {
        match self {
            KeyMatch::Exact => object_key == version_key,
            KeyMatch::Prefix => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Object listing
// ---------------------------------------------------------------------------

/// Objects found by [`list_objects`].
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub objects: Vec<ObjectRef>,
    /// Keys that cannot be written inside the working tree.
    pub skipped: Vec<String>,
    /// The backend had more keys than one page returned.
    pub truncated: bool,
}

/// Enumerate the keys currently in `bucket`.
///
/// One listing call; a truncated page is reported, not followed.  Any error
/// is fatal to the run.
#[instrument(skip(store, metrics))]
pub async fn list_objects(
    store: &dyn ObjectStore,
    bucket: &str,
    metrics: &Metrics,
) -> Result<ObjectListing> {
    let page = store
        .list_objects(bucket)
        .await
        .with_context(|| format!("failed to list objects in bucket {bucket}"))?;

    let mut listing = ObjectListing {
        truncated: page.truncated,
        ..ObjectListing::default()
    };

    for key in page.keys {
        if !is_replayable_key(&key) {
            warn!(%key, "skipping key that cannot be materialized in a working tree");
            listing.skipped.push(key);
            continue;
        }
        listing.objects.push(ObjectRef {
            key,
            bucket: bucket.to_string(),
        });
    }

    if listing.truncated {
        warn!(
            %bucket,
            listed = listing.objects.len() + listing.skipped.len(),
            "object listing was truncated; only the first page will be replayed"
        );
    }

    metrics.objects_listed.inc_by(listing.objects.len() as u64);
    info!(
        objects = listing.objects.len(),
        skipped = listing.skipped.len(),
        "listed bucket objects"
    );
    Ok(listing)
}

/// Whether `key` maps to a regular file strictly inside the working tree.
pub fn is_replayable_key(key: &str) -> bool {
    if key.is_empty() || key.ends_with('/') {
        return false;
    }
    // `Path::components` silently drops interior `.`, so check the raw text.
    // git refuses to stage any path with a `.git` component.
    let parts_ok = key
        .split('/')
        .all(|part| !matches!(part, "" | "." | "..") && !part.eq_ignore_ascii_case(".git"));
    parts_ok
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

// ---------------------------------------------------------------------------
// Version listing
// ---------------------------------------------------------------------------

/// A version-listing error that was isolated instead of aborting the run.
#[derive(Debug, Clone)]
pub struct ListingFailure {
    pub key: String,
    pub error: String,
}

/// Every version collected across all objects, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct VersionListing {
    pub records: Vec<VersionRecord>,
    pub failures: Vec<ListingFailure>,
    /// Objects whose version listing did not fit in one page.
    pub truncated_keys: Vec<String>,
    /// Keys returned by a prefix query that cannot be written inside the
    /// working tree.
    pub skipped_keys: Vec<String>,
}

/// Collect the stored versions of every object.
///
/// Per-object failures are isolated: they are logged, recorded in
/// [`VersionListing::failures`], and that object's versions are left out.
///
/// Modification times are truncated to whole seconds, the resolution of a
/// git date, so versions within the same second land in one changeset.
#[instrument(skip_all, fields(objects = objects.len(), ?key_match))]
pub async fn list_versions(
    store: &dyn ObjectStore,
    objects: &[ObjectRef],
    repository_root: &Path,
    key_match: KeyMatch,
    metrics: &Metrics,
) -> Result<VersionListing> {
    let mut listing = VersionListing::default();

    for object in objects {
        let page = match store.list_versions(&object.bucket, &object.key).await {
            Ok(page) => page,
            Err(err) => match Stage::VersionListing.failure_policy() {
                FailurePolicy::Isolating => {
                    let error = format!("{err:#}");
                    warn!(key = %object.key, %error, "version listing failed; skipping object");
                    metrics.version_listing_failures.inc();
                    listing.failures.push(ListingFailure {
                        key: object.key.clone(),
                        error,
                    });
                    continue;
                }
                FailurePolicy::Fatal => {
                    return Err(err.context(format!("failed to list versions of {}", object.key)));
                }
            },
        };

        if page.truncated {
            warn!(key = %object.key, "version listing was truncated; older versions are missing");
            listing.truncated_keys.push(object.key.clone());
        }

        let before = listing.records.len();
        for version in page.versions {
            if !key_match.accepts(&object.key, &version.key) {
                continue;
            }
            if !is_replayable_key(&version.key) {
                if !listing.skipped_keys.contains(&version.key) {
                    warn!(key = %version.key, "skipping key that cannot be materialized in a working tree");
                    listing.skipped_keys.push(version.key);
                }
                continue;
            }
            listing.records.push(VersionRecord {
                key: version.key,
                bucket: object.bucket.clone(),
                version_id: version.version_id,
                last_modified: version.last_modified.trunc_subsecs(0),
                repository_root: PathBuf::from(repository_root),
            });
        }
        debug!(
            key = %object.key,
            versions = listing.records.len() - before,
            "collected versions"
        );
    }

    metrics.versions_listed.inc_by(listing.records.len() as u64);
    info!(
        versions = listing.records.len(),
        failures = listing.failures.len(),
        skipped = listing.skipped_keys.len(),
        "collected object versions"
    );
    Ok(listing)
}
