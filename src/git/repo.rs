//! Working-tree repository lifecycle.
//!
//! [`GitRepo`] is the single handle the replayer owns for a whole run: it is
//! opened (or initialised) once and every commit goes through it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use super::commands::{self, LogEntry, Signature};

/// An opened repository with a working tree.
#[derive(Debug)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Open the repository at `path`, creating the directory and running
    /// `git init` when no repository exists there yet.
    ///
    /// An existing repository is reused as-is, so a second run appends to
    /// its history.
    #[instrument(fields(path = %path.display()))]
    pub async fn open_or_init(path: &Path) -> Result<Self> {
        create_dir_all_open(path).await?;

        if path.join(".git").exists() {
            info!("reusing existing repository");
        } else {
            commands::git_init(path)
                .await
                .with_context(|| format!("unable to git init in {}", path.display()))?;
            info!("initialised new repository");
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage `paths` (relative to the working tree root).
    pub async fn stage<P: AsRef<Path>>(&self, paths: &[P]) -> Result<()> {
        commands::git_add(&self.path, paths)
            .await
            .context("failed to stage files")
    }

    /// Build a commit object from the index with `HEAD` as its parent.
    ///
    /// Nothing references the commit until [`GitRepo::persist`] is called.
    pub async fn build_commit(&self, message: &str, signature: &Signature) -> Result<PendingCommit> {
        let tree = commands::git_write_tree(&self.path)
            .await
            .context("failed to write tree from index")?;
        let parent = self.head().await?;
        let oid = commands::git_commit_tree(
            &self.path,
            &tree,
            parent.as_deref(),
            message,
            signature,
        )
        .await
        .context("failed to create commit object")?;

        debug!(%oid, %tree, ?parent, "commit built");
        Ok(PendingCommit {
            oid,
            parent,
            committer: signature.clone(),
        })
    }

    /// Record `commit` in the repository by advancing `HEAD` to it.
    ///
    /// Fails if `HEAD` moved since the commit was built.
    pub async fn persist(&self, commit: PendingCommit) -> Result<String> {
        commands::git_update_head(
            &self.path,
            &commit.oid,
            commit.parent.as_deref(),
            &commit.committer,
        )
        .await
        .with_context(|| format!("failed to record commit {} in repository", commit.oid))?;
        Ok(commit.oid)
    }

    /// Current `HEAD` commit, `None` before the first commit.
    pub async fn head(&self) -> Result<Option<String>> {
        commands::git_head(&self.path).await
    }

    /// History reachable from `HEAD`, newest first.
    pub async fn log(&self) -> Result<Vec<LogEntry>> {
        commands::git_log(&self.path).await
    }

    /// Paths changed by commit `oid`.
    pub async fn changed_paths(&self, oid: &str) -> Result<Vec<String>> {
        commands::git_changed_paths(&self.path, oid).await
    }

    /// Content of `path` as committed in `oid`.
    pub async fn file_at(&self, oid: &str, path: &str) -> Result<Vec<u8>> {
        commands::git_show_file(&self.path, oid, path).await
    }
}

/// A commit object that exists in the object database but is not yet on any
/// ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub oid: String,
    pub parent: Option<String>,
    /// Identity written to the reflog entry when the commit is recorded.
    pub committer: Signature,
}

/// `create_dir_all` with world-writable permissions on unix (subject to the
/// process umask).
async fn create_dir_all_open(path: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder
        .create(path)
        .await
        .with_context(|| format!("unable to create directories {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
