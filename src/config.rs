use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::history::KeyMatch;

// ---------------------------------------------------------------------------
// Log format
// ---------------------------------------------------------------------------

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Fully resolved settings for one replay run.
///
/// Built by layering CLI flags over an optional YAML file over defaults; see
/// [`FileConfig`] and [`Overrides`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Bucket whose version history is replayed.
    pub bucket: String,
    /// Directory the repository is created in; the repo lives at
    /// `{output_dir}/{bucket}`.
    pub output_dir: PathBuf,
    pub s3: S3Config,
    pub replay: ReplayConfig,
    pub log_format: LogFormat,
    /// Where to write the OpenMetrics dump at the end of the run.
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    /// Path of the git working tree for this run.
    pub fn repo_path(&self) -> PathBuf {
        self.output_dir.join(&self.bucket)
    }
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    #[serde(default = "default_region")]
    pub region: String,
    /// Named profile from the shared AWS config/credentials files.
    #[serde(default)]
    pub profile: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, Ceph RGW, ...).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayConfig {
    /// How versions returned by a prefix listing are matched to their object.
    #[serde(default)]
    pub key_match: KeyMatch,
    #[serde(default)]
    pub author: AuthorConfig,
}

/// Identity stamped on every replayed commit as both author and committer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorConfig {
    #[serde(default = "default_author_name")]
    pub name: String,
    #[serde(default = "default_author_email")]
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: default_author_name(),
            email: default_author_email(),
        }
    }
}

fn default_author_name() -> String {
    "s3-versions-to-git".to_string()
}

fn default_author_email() -> String {
    "s3-versions-to-git@localhost".to_string()
}

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

/// Shape of the optional YAML config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

/// Values given on the command line. `None` leaves the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket: String,
    pub output_dir: Option<PathBuf>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub key_match: Option<KeyMatch>,
    pub log_format: Option<LogFormat>,
    pub metrics_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load a [`FileConfig`] from a YAML file at `path`.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_file_config(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn parse_file_config(contents: &str) -> Result<FileConfig> {
    // An empty document deserializes to `()`, not to a struct of defaults.
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}

/// Merge CLI overrides onto the file layer and validate the result.
///
/// A relative or missing output directory is resolved against the current
/// working directory.
pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let output_dir = match overrides.output_dir {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => cwd.join(dir),
        None => cwd,
    };

    let mut s3 = file.s3;
    if let Some(region) = overrides.region {
        s3.region = region;
    }
    if overrides.profile.is_some() {
        s3.profile = overrides.profile;
    }

    let mut replay = file.replay;
    if let Some(key_match) = overrides.key_match {
        replay.key_match = key_match;
    }

    let config = Config {
        bucket: overrides.bucket,
        output_dir,
        s3,
        replay,
        log_format: overrides.log_format.unwrap_or(file.log_format),
        metrics_file: overrides.metrics_file.or(file.metrics_file),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed with serde or clap.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(!config.bucket.trim().is_empty(), "please provide an S3 bucket");
    anyhow::ensure!(
        !config.bucket.contains('/'),
        "bucket name must not contain '/': {}",
        config.bucket
    );
    anyhow::ensure!(
        !matches!(config.bucket.as_str(), "." | ".."),
        "bucket name must not be '.' or '..'"
    );
    anyhow::ensure!(!config.s3.region.trim().is_empty(), "region must not be empty");
    anyhow::ensure!(
        !config.replay.author.name.trim().is_empty(),
        "author name must not be empty"
    );
    anyhow::ensure!(
        !config.replay.author.email.trim().is_empty(),
        "author email must not be empty"
    );
    Ok(())
}
