use anyhow::{Context, Result};
use std::sync::Arc;
use crate::cli::args::parse_s3_path;
use crate::config::{Config, UploadOptions};
use crate::s3::S3Client;

/// State shared by every CLI command
///
/// The S3Client is created once. Clones share the same HTTP connection
/// pool, so parts of a multipart upload reuse connections.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    client: S3Client,
    default_bucket: Option<String>,
}

impl Core {
    /// Build the client for the selected profile. `insecure` overrides the
    /// profile's TLS verification setting.
    pub fn new(config: Config, insecure: bool) -> Result<Self> {
        let config = Arc::new(config);

        let mut profile = config
            .profile(None)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No profile found in configuration"))?;
        if insecure {
            profile.insecure_tls = true;
        }

        config
            .upload
            .validate()
            .context("Invalid upload configuration")?;
        let client = S3Client::new(&profile).context("Failed to create S3 client")?;

        tracing::debug!(endpoint = client.endpoint(), region = %profile.region, "client ready");

        Ok(Self {
            default_bucket: profile.bucket.clone(),
            config,
            client,
        })
    }

    /// Shared S3 client
    pub fn s3_client(&self) -> &S3Client {
        &self.client
    }

    pub fn upload_options(&self) -> UploadOptions {
        self.config.upload.clone()
    }

    /// Resolve a command line location into bucket and key.
    ///
    /// `s3://bucket/key` and `s3/bucket/key` name the bucket explicitly. Any
    /// other path is a key in the profile's default bucket.
    pub fn locate(&self, path: &str) -> Result<(String, Option<String>)> {
        let trimmed = path.trim();
        if trimmed.starts_with("s3://") || trimmed.starts_with("s3/") {
            return parse_s3_path(trimmed);
        }
        match &self.default_bucket {
            Some(bucket) => {
                let key = trimmed.trim_start_matches('/');
                Ok((bucket.clone(), (!key.is_empty()).then(|| key.to_string())))
            }
            None => parse_s3_path(trimmed),
        }
    }

    /// Like [`locate`](Self::locate) but a key is required.
    pub fn locate_object(&self, path: &str) -> Result<(String, String)> {
        let (bucket, key) = self.locate(path)?;
        let key = key.ok_or_else(|| anyhow::anyhow!("Object key is required: {}", path))?;
        Ok((bucket, key))
    }
}
