use std::path::Path;
use std::sync::Arc;

use axum::Router;
use taskfy_service::{
    DocumentService, DocumentSettings, FileService, FileSettings, DEFAULT_URL_EXPIRY,
};
use taskfy_store::StoreConfig;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::routes::{AppState, InnerAppState};

pub const TEST_SIGNING_KEY: &str = "test-signing-key";
pub const TEST_PROJECT_PREFIX: &str = "projects/";

/// Store config pointing at `dir`, signing with [`TEST_SIGNING_KEY`].
pub fn test_store_config(dir: &Path, public_url: &str) -> StoreConfig {
    StoreConfig {
        local_data_dir: Some(dir.to_string_lossy().to_string()),
        public_url: Some(public_url.to_string()),
        signing_key: Some(TEST_SIGNING_KEY.into()),
        ..Default::default()
    }
}

/// State with in-memory SQLite and a local store under `dir`.
pub fn test_state(dir: &Path, public_url: &str) -> AppState {
    let db = Arc::new(taskfy_db::SqliteDatabase::open_in_memory().unwrap());
    let store = taskfy_store::create_store(&test_store_config(dir, public_url)).unwrap();
    Arc::new(InnerAppState {
        documents: DocumentService::new(db, DocumentSettings::with_database("taskfy-test")),
        files: FileService::new(
            store,
            FileSettings {
                project_prefix: Some(TEST_PROJECT_PREFIX.into()),
                url_expiry: DEFAULT_URL_EXPIRY,
            },
        ),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    })
}

/// Build a test router with in-memory SQLite and a temp local store.
/// The returned `TempDir` owns the store's files.
pub fn test_router() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), "http://127.0.0.1:3720");
    (crate::routes::build_router(state), dir)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub data_dir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345"); signed URLs it
/// hands out point back at the same server.
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let data_dir = tempfile::tempdir().unwrap();
    let app = crate::routes::build_router(test_state(data_dir.path(), &base_url));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        data_dir,
        _handle: handle,
    }
}
