//! Replays changesets as commits, strictly in order.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, instrument};

use super::materialize::materialize;
use crate::config::AuthorConfig;
use crate::git::{GitRepo, Signature};
use crate::history::Changeset;
use crate::metrics::Metrics;
use crate::storage::ObjectStore;

/// A commit appended during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub oid: String,
    pub timestamp: DateTime<Utc>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub commits: Vec<CommitInfo>,
}

/// Replay every changeset as one commit on `repo`.
///
/// The first error aborts the run: later changesets are never attempted and
/// commits already created are left in place.
#[instrument(skip_all, fields(changesets = changesets.len()))]
pub async fn replay_changesets(
    store: &dyn ObjectStore,
    repo: &GitRepo,
    changesets: &[Changeset],
    author: &AuthorConfig,
    metrics: &Metrics,
) -> Result<ReplaySummary> {
    let total = changesets.len();
    let mut summary = ReplaySummary::default();

    for (index, changeset) in changesets.iter().enumerate() {
        let commit = apply_changeset(store, repo, changeset, author, metrics)
            .await
            .with_context(|| {
                format!(
                    "replay aborted at changeset {} of {} ({}) after {} commits",
                    index + 1,
                    total,
                    changeset.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                    summary.commits.len(),
                )
            })?;
        summary.commits.push(commit);
    }

    Ok(summary)
}

async fn apply_changeset(
    store: &dyn ObjectStore,
    repo: &GitRepo,
    changeset: &Changeset,
    author: &AuthorConfig,
    metrics: &Metrics,
) -> Result<CommitInfo> {
    let commit_time = changeset.commit_time().context("empty changeset")?;

    let mut paths = Vec::with_capacity(changeset.members.len());
    for record in &changeset.members {
        let written = materialize(store, record).await.with_context(|| {
            format!(
                "error downloading {}:{}@{} to {}",
                record.bucket,
                record.key,
                record.version_id,
                record.local_path().display()
            )
        })?;
        metrics.files_materialized.inc();
        metrics.s3_download_bytes.inc_by(written);
        paths.push(record.repo_relative_path().to_path_buf());
    }

    repo.stage(&paths).await?;

    let message = format!(
        "Modification on {}",
        commit_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let signature = Signature {
        name: author.name.clone(),
        email: author.email.clone(),
        unix_time: commit_time.timestamp(),
    };
    let pending = repo.build_commit(&message, &signature).await?;
    let oid = repo.persist(pending).await?;
    metrics.commits_created.inc();

    info!(
        %oid,
        date = %commit_time,
        files = %paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        "applied commit"
    );

    Ok(CommitInfo {
        oid,
        timestamp: commit_time,
        paths,
    })
}
