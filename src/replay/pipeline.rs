//! End-to-end replay: list, collect versions, plan changesets, commit.

use anyhow::Result;
use tracing::{info, instrument, warn};

use super::replayer::{replay_changesets, CommitInfo};
use crate::config::Config;
use crate::git::GitRepo;
use crate::history::{self, listing::ListingFailure};
use crate::metrics::{Metrics, MetricsRegistry};
use crate::storage::ObjectStore;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub objects: usize,
    pub versions: usize,
    pub commits: Vec<CommitInfo>,
    /// Keys skipped because they cannot live in a working tree.
    pub skipped_keys: Vec<String>,
    /// Objects whose versions were left out after a listing failure.
    pub listing_failures: Vec<ListingFailure>,
    /// The object listing hit the single-page limit.
    pub objects_truncated: bool,
    pub versions_truncated: Vec<String>,
}

/// Replay the history of `config.bucket` into `config.repo_path()`.
///
/// The repository is opened before anything is listed so a bad output
/// directory fails before any network traffic.
#[instrument(skip_all, fields(bucket = %config.bucket, repo = %config.repo_path().display()))]
pub async fn run(config: &Config, store: &dyn ObjectStore, metrics: &Metrics) -> Result<RunSummary> {
    let repo = GitRepo::open_or_init(&config.repo_path()).await?;

    let objects = history::list_objects(store, &config.bucket, metrics).await?;
    let versions = history::list_versions(
        store,
        &objects.objects,
        &config.output_dir,
        config.replay.key_match,
        metrics,
    )
    .await?;

    let mut skipped_keys = objects.skipped;
    for key in versions.skipped_keys {
        if !skipped_keys.contains(&key) {
            skipped_keys.push(key);
        }
    }

    let mut summary = RunSummary {
        objects: objects.objects.len(),
        versions: versions.records.len(),
        skipped_keys,
        listing_failures: versions.failures,
        objects_truncated: objects.truncated,
        versions_truncated: versions.truncated_keys,
        ..RunSummary::default()
    };

    let changesets = history::plan_changesets(versions.records);
    info!(changesets = changesets.len(), "replaying changesets");

    let replayed =
        replay_changesets(store, &repo, &changesets, &config.replay.author, metrics).await?;
    summary.commits = replayed.commits;

    info!(
        commits = summary.commits.len(),
        listing_failures = summary.listing_failures.len(),
        "replay complete"
    );
    Ok(summary)
}

/// [`run`] against `registry`, then dump the registry to
/// `config.metrics_file` whether or not the run succeeded.
///
/// A failed dump is logged and never masks the run's own result.
pub async fn run_recorded(
    config: &Config,
    store: &dyn ObjectStore,
    registry: &MetricsRegistry,
) -> Result<RunSummary> {
    let result = run(config, store, &registry.metrics).await;

    if let Some(ref path) = config.metrics_file {
        if let Err(e) = registry.write_to(path).await {
            let error = format!("{e:#}");
            warn!(%error, path = %path.display(), "failed to write metrics file");
        }
    }

    result
}
