//! Git command wrappers using [`tokio::process::Command`].
//!
//! Every function in this module shells out to the system `git` binary for
//! the actual work.  Commands run with `-C <repo>` so the caller's working
//! directory never matters, and with `GIT_TERMINAL_PROMPT=0` so git can never
//! block on input.

use std::path::Path;
use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Name, email and timestamp for a synthetic author/committer.
///
/// `unix_time` is whole seconds; git dates have no sub-second part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch, always recorded as UTC.
    pub unix_time: i64,
}

impl Signature {
    /// Git's internal date format, accepted by `GIT_*_DATE`.
    fn git_date(&self) -> String {
        format!("@{} +0000", self.unix_time)
    }
}

/// One entry of [`git_log`], oldest-last like `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub oid: String,
    pub parents: Vec<String>,
    pub author_time: i64,
    pub author_name: String,
    pub subject: String,
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

fn git(repo_path: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo_path);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

/// Run `cmd`, failing with git's stderr on a non-zero exit.
async fn run(mut cmd: Command, what: &str) -> Result<Output> {
    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to spawn {what}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{what} failed (status {}): {}", output.status, stderr.trim());
    }
    Ok(output)
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Run `git init` in `repo_path`, which must already exist.
#[instrument(fields(repo = %repo_path.display()))]
pub async fn git_init(repo_path: &Path) -> Result<()> {
    let mut cmd = git(repo_path);
    cmd.arg("init").arg("--quiet");
    run(cmd, "git init").await?;
    debug!("git init succeeded");
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Paths passed to a single `git add` invocation.
const ADD_BATCH: usize = 512;

/// Run `git add -- <paths...>` with paths relative to the working tree.
///
/// Paths are taken literally (object keys may contain `*` or `:`) and
/// ignore rules are bypassed.
#[instrument(skip(paths), fields(repo = %repo_path.display(), count = paths.len()))]
pub async fn git_add<P: AsRef<Path>>(repo_path: &Path, paths: &[P]) -> Result<()> {
    for batch in paths.chunks(ADD_BATCH) {
        let mut cmd = git(repo_path);
        cmd.env("GIT_LITERAL_PATHSPECS", "1");
        cmd.arg("add").arg("--force").arg("--");
        for path in batch {
            cmd.arg(path.as_ref());
        }
        run(cmd, "git add").await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commit (two phase)
// ---------------------------------------------------------------------------

/// Run `git write-tree` and return the tree id of the current index.
#[instrument(fields(repo = %repo_path.display()))]
pub async fn git_write_tree(repo_path: &Path) -> Result<String> {
    let mut cmd = git(repo_path);
    cmd.arg("write-tree");
    let output = run(cmd, "git write-tree").await?;
    Ok(stdout_line(&output))
}

/// Run `git commit-tree` and return the new commit id.
///
/// The commit object is written to the object database but no ref points at
/// it yet; see [`git_update_head`].
#[instrument(skip(message), fields(repo = %repo_path.display(), %tree, ?parent))]
pub async fn git_commit_tree(
    repo_path: &Path,
    tree: &str,
    parent: Option<&str>,
    message: &str,
    signature: &Signature,
) -> Result<String> {
    let date = signature.git_date();
    let mut cmd = git(repo_path);
    cmd.arg("commit-tree").arg(tree);
    if let Some(parent) = parent {
        cmd.arg("-p").arg(parent);
    }
    cmd.arg("-m").arg(message);
    cmd.env("GIT_AUTHOR_NAME", &signature.name)
        .env("GIT_AUTHOR_EMAIL", &signature.email)
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_NAME", &signature.name)
        .env("GIT_COMMITTER_EMAIL", &signature.email)
        .env("GIT_COMMITTER_DATE", &date);

    let output = run(cmd, "git commit-tree").await?;
    let oid = stdout_line(&output);
    debug!(%oid, "commit object written");
    Ok(oid)
}

/// Point `HEAD` (through its symbolic ref) at `oid`.
///
/// When `expected` is given the update only succeeds if `HEAD` still
/// resolves to it.
#[instrument(skip(committer), fields(repo = %repo_path.display(), %oid, ?expected))]
pub async fn git_update_head(
    repo_path: &Path,
    oid: &str,
    expected: Option<&str>,
    committer: &Signature,
) -> Result<()> {
    let mut cmd = git(repo_path);
    cmd.env("GIT_COMMITTER_NAME", &committer.name)
        .env("GIT_COMMITTER_EMAIL", &committer.email)
        .env("GIT_COMMITTER_DATE", committer.git_date());
    cmd.arg("update-ref")
        .arg("-m")
        .arg("s3-versions-to-git: replay")
        .arg("HEAD")
        .arg(oid);
    if let Some(expected) = expected {
        cmd.arg(expected);
    }
    run(cmd, "git update-ref").await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Resolve `HEAD` to a commit id, or `None` on an unborn branch.
#[instrument(fields(repo = %repo_path.display()))]
pub async fn git_head(repo_path: &Path) -> Result<Option<String>> {
    let mut cmd = git(repo_path);
    cmd.arg("rev-parse")
        .arg("--verify")
        .arg("--quiet")
        .arg("HEAD^{commit}");
    let output = cmd
        .output()
        .await
        .context("failed to spawn git rev-parse")?;

    // `--verify --quiet` exits 1 with no output when HEAD does not resolve.
    match output.status.code() {
        Some(0) => Ok(Some(stdout_line(&output))),
        Some(1) if output.stdout.is_empty() => Ok(None),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git rev-parse HEAD failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }
    }
}

/// Run `git log` from `HEAD` and parse one [`LogEntry`] per commit.
#[instrument(fields(repo = %repo_path.display()))]
pub async fn git_log(repo_path: &Path) -> Result<Vec<LogEntry>> {
    if git_head(repo_path).await?.is_none() {
        return Ok(Vec::new());
    }

    let mut cmd = git(repo_path);
    cmd.arg("log").arg("--format=%H%x1f%P%x1f%at%x1f%an%x1f%s");
    let output = run(cmd, "git log").await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut entries = Vec::new();
    for line in stdout.lines() {
        if line.is_empty() {
            continue;
        }
        entries.push(parse_log_line(line)?);
    }

    debug!(commits = entries.len(), "git log complete");
    Ok(entries)
}

fn parse_log_line(line: &str) -> Result<LogEntry> {
    let fields: Vec<&str> = line.split('\x1f').collect();
    let [oid, parents, time, name, subject] = fields.as_slice() else {
        bail!("unexpected git log line: {line:?}");
    };
    Ok(LogEntry {
        oid: oid.to_string(),
        parents: parents.split_whitespace().map(str::to_string).collect(),
        author_time: time
            .parse()
            .with_context(|| format!("bad author time in git log: {time:?}"))?,
        author_name: name.to_string(),
        subject: subject.to_string(),
    })
}

/// Paths touched by commit `oid`, relative to the working tree.
#[instrument(fields(repo = %repo_path.display(), %oid))]
pub async fn git_changed_paths(repo_path: &Path, oid: &str) -> Result<Vec<String>> {
    let mut cmd = git(repo_path);
    cmd.arg("diff-tree")
        .arg("--root")
        .arg("--no-commit-id")
        .arg("--name-only")
        .arg("-r")
        .arg("-z")
        .arg(oid);
    let output = run(cmd, "git diff-tree").await?;

    Ok(output
        .stdout
        .split(|b| *b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect())
}

/// Content of `path` as of commit `oid`.
#[instrument(fields(repo = %repo_path.display(), %oid, %path))]
pub async fn git_show_file(repo_path: &Path, oid: &str, path: &str) -> Result<Vec<u8>> {
    let mut cmd = git(repo_path);
    cmd.arg("cat-file").arg("blob").arg(format!("{oid}:{path}"));
    let output = run(cmd, "git cat-file").await?;
    Ok(output.stdout)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
