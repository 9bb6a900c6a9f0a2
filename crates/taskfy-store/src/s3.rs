use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use s3::bucket_ops::BucketConfiguration;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{ObjectMeta, ObjectStore, StoreConfig, StoreError};

/// Longest expiry S3 accepts for a presigned URL (7 days).
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

pub struct S3Store {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store").finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: config.region.clone().unwrap_or_else(|| "us-east-1".into()),
            endpoint: config.endpoint_url.clone().unwrap_or_default(),
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("credentials: {e}")))?;

        let bucket_name = config
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::Internal("bucket name required".into()))?;

        let mut bucket = Bucket::new(bucket_name, region.clone(), credentials.clone())
            .map_err(|e| StoreError::Internal(format!("bucket: {e}")))?;
        bucket.set_path_style();

        Ok(Self {
            bucket,
            region,
            credentials,
        })
    }
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn create_bucket_if_absent(&self) -> Result<(), StoreError> {
        if self.bucket_exists().await? {
            return Ok(());
        }
        let response = Bucket::create_with_path_style(
            &self.bucket.name,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(map_s3_error)?;

        match response.response_code {
            200..=299 => {
                tracing::info!("created bucket {}", self.bucket.name);
                Ok(())
            }
            // Created concurrently by another writer.
            409 => Ok(()),
            code => Err(StoreError::Internal(format!(
                "s3 create bucket {}: status {code}",
                self.bucket.name
            ))),
        }
    }

    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        self.bucket.exists().await.map_err(map_s3_error)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(map_s3_error)?;
        if response.status_code() >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 put {}: status {}",
                key,
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self.bucket.get_object(key).await.map_err(map_s3_error)?;
        if response.status_code() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if response.status_code() >= 400 {
            return Err(StoreError::Internal(format!(
                "s3 get {}: status {}",
                key,
                response.status_code()
            )));
        }
        Ok(Bytes::from(response.to_vec()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let (_, status) = self.bucket.head_object(key).await.map_err(map_s3_error)?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            code => Err(StoreError::Internal(format!(
                "s3 head {key}: status {code}"
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let results = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(map_s3_error)?;

        // S3 only reports a modification time.
        let mut objects: Vec<ObjectMeta> = results
            .into_iter()
            .flat_map(|result| result.contents)
            .map(|object| {
                let modified = parse_timestamp(&object.last_modified);
                ObjectMeta {
                    key: object.key,
                    size: object.size,
                    created_at: modified,
                    last_modified: modified,
                }
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError> {
        let secs = expiry.as_secs().clamp(1, MAX_PRESIGN_SECS) as u32;
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-disposition".to_string(),
            "inline".to_string(),
        );
        self.bucket
            .presign_get(key, secs, Some(queries))
            .await
            .map_err(map_s3_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoreConfig {
        StoreConfig {
            endpoint_url: Some("http://localhost:3900".into()),
            region: Some("garage".into()),
            bucket: Some("test-bucket".into()),
            access_key_id: Some("key".into()),
            secret_access_key: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_bucket_produces_error() {
        let config = StoreConfig {
            bucket: None,
            ..config()
        };
        let err = S3Store::new(&config).unwrap_err();
        assert!(err.to_string().contains("bucket name required"));
    }

    #[test]
    fn valid_config_creates_store() {
        let store = S3Store::new(&config()).unwrap();
        assert_eq!(store.bucket(), "test-bucket");
    }

    #[test]
    fn timestamps_parse_from_listing_format() {
        let t = parse_timestamp("2024-05-01T12:30:00.000Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-01T12:30:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[tokio::test]
    async fn presigned_url_is_inline_and_bounded() {
        let store = S3Store::new(&config()).unwrap();
        let url = store
            .signed_url("proj/p1/a.png", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("proj/p1/a.png"));
        assert!(url.contains("response-content-disposition=inline"));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    // -- S3 integration tests (require running Garage/MinIO) --

    fn s3_config() -> Option<StoreConfig> {
        let config = StoreConfig::from_env();
        if config.is_s3() {
            Some(config)
        } else {
            None
        }
    }

    #[tokio::test]
    #[ignore]
    async fn s3_put_list_sign_roundtrip() {
        let config = s3_config().expect("S3 not configured; skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();
        store.create_bucket_if_absent().await.unwrap();
        assert!(store.bucket_exists().await.unwrap());

        let prefix = "integration-test/roundtrip/";
        let key = format!("{prefix}hello.txt");
        store
            .put(&key, Bytes::from("hello s3"), "text/plain")
            .await
            .unwrap();

        let data = store.get(&key).await.unwrap();
        assert_eq!(data.as_ref(), b"hello s3");
        assert!(store.exists(&key).await.unwrap());

        let objects = store.list(prefix).await.unwrap();
        let listed = objects.iter().find(|o| o.key == key).unwrap();
        assert_eq!(listed.size, 8);
        assert!(listed.last_modified.is_some());

        let url = store
            .signed_url(&key, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http"));
    }

    #[tokio::test]
    #[ignore]
    async fn s3_not_found() {
        let config = s3_config().expect("S3 not configured; skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();

        let err = store
            .get("integration-test/nonexistent-key-12345")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!store
            .exists("integration-test/nonexistent-key-12345")
            .await
            .unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn s3_list_empty_prefix() {
        let config = s3_config().expect("S3 not configured; skipped via #[ignore]");
        let store = S3Store::new(&config).unwrap();
        let objects = store
            .list("integration-test/guaranteed-empty-prefix-xyz/")
            .await
            .unwrap();
        assert!(objects.is_empty());
    }
}
