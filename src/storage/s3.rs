use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::{ObjectPage, ObjectStore, StoredVersion, VersionPage};
use crate::config::S3Config;

/// [`ObjectStore`] backed by an AWS SDK S3 client.
pub struct S3Storage {
    pub client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the shared AWS config chain, honouring the
    /// configured region, profile and endpoint.
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let mut loader =
            aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

        if let Some(ref profile) = config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            region = %config.region,
            profile = config.profile.as_deref().unwrap_or("default"),
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            "S3 client initialised"
        );
        Ok(Self::new(Client::from_conf(s3_config)))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Storage {
    #[instrument(skip(self), fields(%bucket))]
    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("S3 ListObjectsV2 on bucket {bucket}"))?;

        let keys: Vec<String> = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        let truncated = resp.is_truncated().unwrap_or(false);
        debug!(count = keys.len(), truncated, "listed objects");
        Ok(ObjectPage { keys, truncated })
    }

    #[instrument(skip(self), fields(%bucket, %prefix))]
    async fn list_versions(&self, bucket: &str, prefix: &str) -> Result<VersionPage> {
        let resp = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .with_context(|| format!("S3 ListObjectVersions on {bucket}/{prefix}"))?;

        let mut versions = Vec::with_capacity(resp.versions().len());
        for version in resp.versions() {
            let (Some(key), Some(modified)) = (version.key(), version.last_modified()) else {
                continue;
            };
            let last_modified = to_chrono(modified)
                .with_context(|| format!("timestamp out of range for {key}"))?;
            versions.push(StoredVersion {
                key: key.to_string(),
                // Unversioned objects report the literal id "null".
                version_id: version.version_id().unwrap_or("null").to_string(),
                last_modified,
            });
        }

        let truncated = resp.is_truncated().unwrap_or(false);
        debug!(count = versions.len(), truncated, "listed versions");
        Ok(VersionPage {
            versions,
            truncated,
        })
    }

    #[instrument(skip(self), fields(%bucket, %key, %version_id))]
    async fn get_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .version_id(version_id)
            .send()
            .await
            .with_context(|| format!("S3 GetObject {bucket}:{key}@{version_id}"))?;

        let bytes = resp
            .body
            .collect()
            .await
            .with_context(|| format!("read S3 GetObject body for {key}@{version_id}"))?
            .into_bytes();

        debug!(bytes = bytes.len(), "version fetched");
        Ok(bytes)
    }
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}
