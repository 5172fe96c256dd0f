use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use s3_history::config::{self, Config, LogFormat, Overrides};
use s3_history::history::KeyMatch;
use s3_history::metrics::MetricsRegistry;
use s3_history::replay;
use s3_history::storage::S3Storage;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "s3-versions-to-git",
    about = "S3 Versions To Git History",
    long_about = "Turn every stored version of every object in an S3 bucket into a git \
                  history whose commits carry the original modification times."
)]
struct Cli {
    /// The S3 bucket you'd like to turn into a git repo.
    #[arg(long)]
    bucket: String,

    /// The output directory to create a git repo in. Defaults to the current
    /// directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// The AWS profile you'd like to use. Defaults to the standard credential
    /// chain.
    #[arg(long)]
    profile: Option<String>,

    /// The AWS region you'd like to use. Defaults to us-west-2.
    #[arg(long)]
    region: Option<String>,

    /// Optional YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How versions from a prefix listing are matched to their object.
    #[arg(long, value_enum)]
    key_match: Option<KeyMatch>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Write OpenMetrics counters for the run to this file.
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let file = match self.config {
            Some(ref path) => config::load_file_config(path)?,
            None => config::FileConfig::default(),
        };
        config::resolve(
            file,
            Overrides {
                bucket: self.bucket,
                output_dir: self.output,
                profile: self.profile,
                region: self.region,
                key_match: self.key_match,
                log_format: self.log_format,
                metrics_file: self.metrics_file,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI / config ----
    let config = Cli::parse().into_config()?;

    // ---- Tracing ----
    init_tracing(config.log_format);
    tracing::info!(
        bucket = %config.bucket,
        repo = %config.repo_path().display(),
        key_match = ?config.replay.key_match,
        "starting replay"
    );

    // ---- Infrastructure clients ----
    let store = S3Storage::connect(&config.s3)
        .await
        .context("couldn't load AWS configuration; have you set up your AWS account?")?;
    let metrics = MetricsRegistry::new();

    // ---- Replay ----
    let result = replay::run_recorded(&config, &store, &metrics).await;

    match result {
        Ok(summary) => {
            if summary.objects_truncated {
                tracing::warn!("bucket listing was truncated; history covers only the first page of objects");
            }
            if !summary.listing_failures.is_empty() {
                tracing::warn!(
                    objects = summary.listing_failures.len(),
                    "some objects were skipped because their versions could not be listed"
                );
            }
            tracing::info!(
                commits = summary.commits.len(),
                versions = summary.versions,
                "done"
            );
            Ok(())
        }
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(%error, "replay failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bucket_is_required() {
        let err = Cli::try_parse_from(["s3-versions-to-git"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn help_exits_without_parsing() {
        let err = Cli::try_parse_from(["s3-versions-to-git", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn flags_flow_into_config() {
        let cli = Cli::try_parse_from([
            "s3-versions-to-git",
            "--bucket=photos",
            "--output=/srv/mirror",
            "--profile=archive",
            "--region=eu-west-1",
            "--key-match=prefix",
            "--log-format=json",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.bucket, "photos");
        assert_eq!(config.repo_path(), PathBuf::from("/srv/mirror/photos"));
        assert_eq!(config.s3.profile.as_deref(), Some("archive"));
        assert_eq!(config.s3.region, "eu-west-1");
        assert_eq!(config.replay.key_match, KeyMatch::Prefix);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
