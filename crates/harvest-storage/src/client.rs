//! S3 client implementation.

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectInfo, ObjectStore};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Bucket name
    pub bucket: String,
    /// Key prefix under which clip folders live
    pub prefix: String,
    /// Custom endpoint (S3-compatible stores); AWS when absent
    pub endpoint_url: Option<String>,
    /// Region; provider chain default when absent
    pub region: Option<String>,
    /// Static access key, used together with `secret_access_key`
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            bucket: std::env::var("S3_BUCKET")
                .map_err(|_| StorageError::config_error("S3_BUCKET not set"))?,
            prefix: std::env::var("S3_PREFIX")
                .map_err(|_| StorageError::config_error("S3_PREFIX not set"))?,
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            region: std::env::var("S3_REGION").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").ok(),
        })
    }
}

/// S3 (or S3-compatible) storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new client from configuration.
    ///
    /// Static keys are used when both are configured; otherwise the default
    /// AWS provider chain (env, profile, instance role) applies.
    pub async fn new(config: StoreConfig) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }

        let client = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "harvest");
                let mut builder = Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(
                        config.region.clone().unwrap_or_else(|| "us-east-1".to_string()),
                    ))
                    .credentials_provider(credentials);
                if let Some(endpoint) = &config.endpoint_url {
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
            _ => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = &config.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let sdk_config = loader.load().await;
                let mut builder = Builder::from(&sdk_config);
                if let Some(endpoint) = &config.endpoint_url {
                    builder = builder.endpoint_url(endpoint).force_path_style(true);
                }
                Client::from_conf(builder.build())
            }
        };

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StoreConfig::from_env()?;
        Self::new(config).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// One `ListObjectsV2` page. The continuation token is only handed on
    /// while the listing is truncated.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> StorageResult<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| StorageError::list_failed(e.to_string()))?;

        let objects = response
            .contents()
            .iter()
            .map(|obj| ObjectInfo {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
            })
            .collect();
        let next_token = match response.is_truncated() {
            Some(true) => response.next_continuation_token().map(str::to_string),
            _ => None,
        };

        Ok(ListPage { objects, next_token })
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::config_error(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        debug!("Listing objects with prefix: {}", prefix);
        collect_pages(move |token| self.list_page(prefix, token)).await
    }

    async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Downloading {} to {}", key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(format!("{}: {}", key, e))
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        tokio::io::copy(&mut reader, &mut file).await?;

        info!("Downloaded {} to {}", key, path.display());
        Ok(())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Default)]
struct ListPage {
    objects: Vec<ObjectInfo>,
    next_token: Option<String>,
}

/// Follow continuation tokens until a page comes back without one.
async fn collect_pages<F, Fut>(mut fetch: F) -> StorageResult<Vec<ObjectInfo>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = StorageResult<ListPage>>,
{
    let mut objects = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token.take()).await?;
        objects.extend(page.objects);
        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(objects),
        }
    }
}

/// Content type from the key's extension.
fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("p/a/a_video.mp4"), "video/mp4");
        assert_eq!(content_type_for("p/a/a_audio.MP3"), "audio/mpeg");
        assert_eq!(content_type_for("p/a/a_metadata.json"), "application/json");
        assert_eq!(content_type_for("p/a/README"), "application/octet-stream");
    }

    fn page(keys: &[&str], next_token: Option<&str>) -> ListPage {
        ListPage {
            objects: keys.iter().map(|k| ObjectInfo::new(*k, 1)).collect(),
            next_token: next_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_listing_follows_continuation_tokens() {
        let mut pages = vec![
            page(&["p/a/a_video.mp4"], Some("t1")),
            page(&["p/a/a_audio.mp3", "p/a/a_metadata.json"], Some("t2")),
            page(&["p/b/b_video.mp4"], None),
        ]
        .into_iter();
        let mut tokens = Vec::new();

        let objects = collect_pages(|token| {
            tokens.push(token);
            let next = pages.next();
            async move { next.ok_or_else(|| StorageError::list_failed("no more pages")) }
        })
        .await
        .unwrap();

        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["p/a/a_video.mp4", "p/a/a_audio.mp3", "p/a/a_metadata.json", "p/b/b_video.mp4"]
        );
        assert_eq!(tokens, vec![None, Some("t1".to_string()), Some("t2".to_string())]);
    }

    #[tokio::test]
    async fn test_listing_error_on_later_page() {
        let mut calls = 0;
        let result = collect_pages(|_| {
            calls += 1;
            let reply = if calls == 1 {
                Ok(page(&["p/a/a_video.mp4"], Some("t1")))
            } else {
                Err(StorageError::list_failed("throttled"))
            };
            async move { reply }
        })
        .await;

        assert!(matches!(result, Err(StorageError::ListFailed(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    #[ignore = "requires S3"]
    async fn test_s3_connectivity() {
        dotenvy::dotenv().ok();
        let client = S3Client::from_env().await.expect("Failed to create S3 client");
        client.check_connectivity().await.expect("S3 not reachable");

        let objects = client.list_objects("").await.expect("Failed to list");
        println!("{} objects in {}", objects.len(), client.bucket());
    }
}
