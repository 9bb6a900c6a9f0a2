use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::{ObjectMeta, ObjectStore, StoreConfig, StoreError, DEFAULT_PUBLIC_URL};

type HmacSha256 = Hmac<Sha256>;

/// Filesystem-backed store laid out as `base_dir/bucket/key`. It signs and
/// verifies its own read URLs, which the server serves under `/blob/`.
pub struct LocalStore {
    base_dir: PathBuf,
    bucket: String,
    public_url: Url,
    signing_key: String,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("base_dir", &self.base_dir)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_dir = config
            .local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let raw_url = config.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL);
        let public_url = Url::parse(raw_url)
            .map_err(|e| StoreError::Internal(format!("public url '{raw_url}': {e}")))?;
        if public_url.cannot_be_a_base() {
            return Err(StoreError::Internal(format!(
                "public url '{raw_url}' cannot be a base"
            )));
        }
        let signing_key = config.signing_key.clone().unwrap_or_else(|| {
            tracing::warn!("no signing key configured; signed URLs will not survive a restart");
            generate_signing_key()
        });
        Ok(Self {
            base_dir,
            bucket: config.bucket_name().to_string(),
            public_url,
            signing_key,
        })
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn bucket_dir(&self) -> PathBuf {
        self.base_dir.join(&self.bucket)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let path = Path::new(key);
        let clean = !key.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_dir().join(path))
    }

    async fn require_bucket(&self) -> Result<(), StoreError> {
        if self.bucket_exists().await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("bucket {}", self.bucket)))
        }
    }

    /// HMAC-SHA256 over `bucket \n key \n expires`, keyed by the signing secret.
    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, StoreError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .map_err(|e| StoreError::Internal(format!("signing key: {e}")))?;
        mac.update(self.bucket.as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn signature(&self, key: &str, expires: i64) -> Result<String, StoreError> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// Signed URL for `key` valid until the unix timestamp `expires`.
    pub fn signed_url_until(&self, key: &str, expires: i64) -> Result<String, StoreError> {
        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Internal("public url cannot be a base".into()))?
            .pop_if_empty()
            .push("blob")
            .push(&self.bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(key, expires)?);
        Ok(url.into())
    }

    /// Verify a signature as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        let mismatch = || StoreError::Forbidden("signature does not match".into());
        let provided = hex::decode(signature).map_err(|_| mismatch())?;
        self.mac(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| mismatch())?;
        if expires < now {
            return Err(StoreError::Forbidden("signed URL has expired".into()));
        }
        Ok(())
    }
}

/// Reproduce the same default data directory logic as `taskfy_db::data_dir()`
/// without taking a dependency on the db crate.
fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskfy").join("blobs")
}

/// 43 random base62 characters.
fn generate_signing_key() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..43)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

fn io_err(op: &str, path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Internal(format!("{op} {}: {e}", path.display()))
}

fn object_meta(key: String, metadata: &std::fs::Metadata) -> ObjectMeta {
    ObjectMeta {
        key,
        size: metadata.len(),
        created_at: metadata.created().ok().map(DateTime::<Utc>::from),
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket_if_absent(&self) -> Result<(), StoreError> {
        let dir = self.bucket_dir();
        if !self.bucket_exists().await? {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| io_err("mkdir", &dir, e))?;
            tracing::info!("created bucket {}", self.bucket);
        }
        Ok(())
    }

    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        let dir = self.bucket_dir();
        match tokio::fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("stat", &dir, e)),
        }
    }

    // The content type is derived from the key when the blob is served.
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        self.require_bucket().await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err("mkdir", parent, e))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| io_err("write", &path, e))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(io_err("read", &path, e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("stat", &path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let root = self.bucket_dir();
        let mut objects = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err("list", &current, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_err("read_dir", &current, e))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| io_err("stat", &path, e))?;
                if metadata.is_dir() {
                    stack.push(path);
                    continue;
                }
                // Keys always use '/' regardless of platform.
                let Ok(rel) = path.strip_prefix(&root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    objects.push(object_meta(key, &metadata));
                }
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<String, StoreError> {
        self.resolve(key)?;
        let expires = Utc::now().timestamp() + expiry.as_secs() as i64;
        self.signed_url_until(key, expires)
    }

    fn verify_signed_url(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), StoreError> {
        self.verify_at(key, expires, signature, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "test-secret";

    fn test_store(dir: &Path) -> LocalStore {
        let config = StoreConfig {
            local_data_dir: Some(dir.to_string_lossy().to_string()),
            public_url: Some("http://files.test:8080".into()),
            signing_key: Some(TEST_KEY.into()),
            ..Default::default()
        };
        LocalStore::new(&config).unwrap()
    }

    async fn ready_store(dir: &Path) -> LocalStore {
        let store = test_store(dir);
        store.create_bucket_if_absent().await.unwrap();
        store
    }

    fn query_param(url: &str, name: &str) -> String {
        let url = Url::parse(url).unwrap();
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        store
            .put("projects/p1/notes.txt", Bytes::from("hello world"), "text/plain")
            .await
            .unwrap();
        let data = store.get("projects/p1/notes.txt").await.unwrap();
        assert_eq!(data.as_ref(), b"hello world");
        assert!(tmp
            .path()
            .join(crate::DEFAULT_BUCKET)
            .join("projects/p1/notes.txt")
            .exists());
    }

    #[tokio::test]
    async fn bucket_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        assert!(!store.bucket_exists().await.unwrap());

        store.create_bucket_if_absent().await.unwrap();
        store.create_bucket_if_absent().await.unwrap();
        assert!(store.bucket_exists().await.unwrap());
    }

    #[tokio::test]
    async fn put_without_bucket_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let err = store
            .put("p/a.txt", Bytes::from("x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        let err = store.get("nonexistent/key").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!store.exists("nonexistent/key").await.unwrap());
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        store.put("key", Bytes::from("first"), "text/plain").await.unwrap();
        store.put("key", Bytes::from("second"), "text/plain").await.unwrap();

        let data = store.get("key").await.unwrap();
        assert_eq!(data.as_ref(), b"second");
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_bucket() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        for key in ["../outside.txt", "/etc/passwd", "a/../../b", ""] {
            let err = store
                .put(key, Bytes::from("x"), "text/plain")
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn list_filters_by_prefix_with_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        store.put("proj/P1/b.txt", Bytes::from("bb"), "text/plain").await.unwrap();
        store.put("proj/P1/a.png", Bytes::from("a"), "image/png").await.unwrap();
        store.put("proj/P10/c.txt", Bytes::from("ccc"), "text/plain").await.unwrap();

        let objects = store.list("proj/P1/").await.unwrap();
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["proj/P1/a.png", "proj/P1/b.txt"]);
        assert_eq!(objects[1].size, 2);
        assert!(objects[1].last_modified.is_some());

        let all = store.list("proj/").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn list_on_missing_bucket_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        assert!(store.list("anything/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_url_points_at_blob_route() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ready_store(tmp.path()).await;

        let url = store
            .signed_url("proj/p1/my file.txt", Duration::from_secs(3600))
            .await
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("files.test"));
        assert_eq!(
            parsed.path(),
            "/blob/taskfy-blob-container/proj/p1/my%20file.txt"
        );

        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");
        store
            .verify_signed_url("proj/p1/my file.txt", expires, &signature)
            .unwrap();
    }

    #[test]
    fn verify_rejects_tampering_and_expiry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let url = store.signed_url_until("p/a.txt", 1_000).unwrap();
        let signature = query_param(&url, "signature");

        // valid up to and including the expiry second
        store.verify_at("p/a.txt", 1_000, &signature, 999).unwrap();
        store.verify_at("p/a.txt", 1_000, &signature, 1_000).unwrap();

        let err = store
            .verify_at("p/a.txt", 1_000, &signature, 1_001)
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        // extending the expiry invalidates the signature
        let err = store
            .verify_at("p/a.txt", 5_000, &signature, 999)
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let err = store
            .verify_at("p/b.txt", 1_000, &signature, 999)
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
    }

    #[test]
    fn signature_is_hmac_sha256() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());

        let mut expected = HmacSha256::new_from_slice(TEST_KEY.as_bytes()).unwrap();
        expected.update(b"taskfy-blob-container\np/a.txt\n1000");
        let expected = hex::encode(expected.finalize().into_bytes());
        assert_eq!(store.signature("p/a.txt", 1_000).unwrap(), expected);
        assert_eq!(expected.len(), 64);

        // a plain digest of secret and message is not accepted
        use sha2::Digest;
        let mut naive = Sha256::new();
        naive.update(format!("{TEST_KEY}\ntaskfy-blob-container\np/a.txt\n1000"));
        let naive = format!("{:x}", naive.finalize());
        assert!(store.verify_at("p/a.txt", 1_000, &naive, 0).is_err());
    }

    #[test]
    fn malformed_signatures_are_forbidden() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(tmp.path());
        let signature = store.signature("p/a.txt", 1_000).unwrap();

        let extended = format!("{signature}00");
        for bad in ["", "zz", &signature[..63], &signature[..62], extended.as_str()] {
            let err = store.verify_at("p/a.txt", 1_000, bad, 0).unwrap_err();
            assert!(matches!(err, StoreError::Forbidden(_)), "accepted {bad:?}");
        }
        // hex is case-insensitive
        store
            .verify_at("p/a.txt", 1_000, &signature.to_uppercase(), 0)
            .unwrap();
    }

    #[test]
    fn signatures_depend_on_the_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let a = test_store(tmp.path());
        let b = LocalStore::new(&StoreConfig {
            local_data_dir: Some(tmp.path().to_string_lossy().to_string()),
            signing_key: Some("other-secret".into()),
            ..Default::default()
        })
        .unwrap();
        assert_ne!(a.signature("k", 10).unwrap(), b.signature("k", 10).unwrap());
    }

    #[test]
    fn random_signing_key_when_unset() {
        let key = generate_signing_key();
        assert_eq!(key.len(), 43);
        assert_ne!(key, generate_signing_key());
    }
}
