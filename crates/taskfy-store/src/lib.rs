mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use taskfy_core::TaskfyError;

/// Bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "taskfy-blob-container";

/// Base of locally signed URLs when none is configured.
pub const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:3720";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Internal(String),
}

impl From<StoreError> for TaskfyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => TaskfyError::NotFound(format!("object not found: {key}")),
            StoreError::InvalidKey(key) => TaskfyError::Validation(format!("invalid object key: {key}")),
            StoreError::Forbidden(msg) => TaskfyError::Forbidden(msg),
            StoreError::Internal(msg) => TaskfyError::Backend(msg),
        }
    }
}

/// Metadata for one stored object, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Not every backend tracks creation separately from modification.
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A single bucket of opaque blobs keyed by string paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store writes to.
    fn bucket(&self) -> &str;

    /// Create the bucket. No-op if it already exists.
    async fn create_bucket_if_absent(&self) -> Result<(), StoreError>;

    async fn bucket_exists(&self) -> Result<bool, StoreError>;

    /// Write (create or overwrite) an object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Read an object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// A read-only URL for `key` that stops working after `expiry`.
    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError>;

    /// Check a URL produced by `signed_url` for stores that serve their own
    /// blobs. Remote stores verify their own URLs and reject everything here.
    fn verify_signed_url(
        &self,
        _key: &str,
        _expires: i64,
        _signature: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Forbidden(
            "this store does not serve signed URLs".into(),
        ))
    }
}

/// Content type served for a key, derived from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

// -- Configuration --

/// Configuration for the object store backend.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// S3-compatible endpoint URL (e.g., "http://127.0.0.1:3900").
    /// When `None`, use local filesystem.
    pub endpoint_url: Option<String>,
    /// S3 region (e.g., "garage", "us-east-1").
    pub region: Option<String>,
    /// Bucket name. Defaults to `DEFAULT_BUCKET`.
    pub bucket: Option<String>,
    /// AWS access key ID.
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    pub secret_access_key: Option<String>,
    /// Local filesystem base directory (used when S3 is not configured).
    pub local_data_dir: Option<String>,
    /// Base URL the server is reachable at; locally signed URLs point here.
    pub public_url: Option<String>,
    /// Secret for locally signed URLs. Random per process when unset.
    pub signing_key: Option<String>,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl StoreConfig {
    /// Build from environment variables.
    /// If `TASKFY_S3_ENDPOINT` (or `AWS_ENDPOINT_URL`) is set along with
    /// credentials and a bucket name, use S3. Otherwise, fall back to local filesystem.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env_opt("TASKFY_S3_ENDPOINT").or_else(|| env_opt("AWS_ENDPOINT_URL")),
            region: env_opt("TASKFY_S3_REGION").or_else(|| env_opt("AWS_REGION")),
            bucket: env_opt("TASKFY_S3_BUCKET").or_else(|| env_opt("TASKFY_BUCKET")),
            access_key_id: env_opt("TASKFY_S3_ACCESS_KEY_ID")
                .or_else(|| env_opt("AWS_ACCESS_KEY_ID")),
            secret_access_key: env_opt("TASKFY_S3_SECRET_ACCESS_KEY")
                .or_else(|| env_opt("AWS_SECRET_ACCESS_KEY")),
            local_data_dir: env_opt("TASKFY_LOCAL_DATA_DIR"),
            public_url: env_opt("TASKFY_PUBLIC_URL"),
            signing_key: env_opt("TASKFY_SIGNING_KEY"),
        }
    }

    pub fn is_s3(&self) -> bool {
        self.endpoint_url.is_some()
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.bucket.is_some()
    }

    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }
}

// -- Factory --

/// Create an `ObjectStore` from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    if config.is_s3() {
        #[cfg(feature = "s3")]
        {
            tracing::info!("using s3 object store, bucket {}", config.bucket_name());
            Ok(Arc::new(S3Store::new(config)?))
        }
        #[cfg(not(feature = "s3"))]
        {
            Err(StoreError::Internal(
                "S3 configuration detected but the 's3' feature is not enabled".into(),
            ))
        }
    } else {
        let store = LocalStore::new(config)?;
        tracing::info!(
            "using local object store at {}, bucket {}",
            store.base_dir().display(),
            config.bucket_name()
        );
        Ok(Arc::new(store))
    }
}
