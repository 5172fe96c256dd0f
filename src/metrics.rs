use std::path::Path;

use anyhow::{Context, Result};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Counters describing one replay run.
///
/// `Default` yields unregistered counters, which is what tests use.
#[derive(Debug, Default)]
pub struct Metrics {
    // -- listing --
    pub objects_listed: Counter,
    pub versions_listed: Counter,
    pub version_listing_failures: Counter,

    // -- materialization --
    pub files_materialized: Counter,
    pub s3_download_bytes: Counter,

    // -- replay --
    pub commits_created: Counter,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();

        registry.register(
            "s3history_objects_listed",
            "Objects returned by the bucket listing",
            metrics.objects_listed.clone(),
        );
        registry.register(
            "s3history_versions_listed",
            "Object versions collected for replay",
            metrics.versions_listed.clone(),
        );
        registry.register(
            "s3history_version_listing_failures",
            "Objects whose version listing failed and was skipped",
            metrics.version_listing_failures.clone(),
        );
        registry.register(
            "s3history_files_materialized",
            "Versions written to the working tree",
            metrics.files_materialized.clone(),
        );
        registry.register(
            "s3history_s3_download_bytes",
            "Total bytes downloaded from S3",
            metrics.s3_download_bytes.clone(),
        );
        registry.register(
            "s3history_commits_created",
            "Commits appended to the repository",
            metrics.commits_created.clone(),
        );

        metrics
    }
}

// ---------------------------------------------------------------------------
// Registry handle
// ---------------------------------------------------------------------------

/// Registry plus the metrics registered in it.
pub struct MetricsRegistry {
    pub registry: Registry,
    pub metrics: Metrics,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all replay metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self { registry, metrics }
    }

    /// OpenMetrics text encoding of the current values.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        encode(&mut out, &self.registry).context("failed to encode metrics")?;
        Ok(out)
    }

    /// Write [`Self::encode`] to `path`, replacing any previous dump.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let text = self.encode()?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("failed to write metrics to {}", path.display()))
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
